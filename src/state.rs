//! Upload → edit → result lifecycle.
//!
//! [`AppState`] is an immutable snapshot. Every user event goes through one of
//! its transition functions, which return the next snapshot and leave the
//! current one untouched.

use std::path::{Path, PathBuf};

use crate::client::EditedImage;
use crate::error::EditResult;
use crate::prompt::Prompt;
use crate::upload::{self, ImageFile};

/// The user's original file, tagged with a session-unique id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceImage {
    pub id: u64,
    pub path: PathBuf,
    pub name: String,
    pub mime_type: String,
}

impl SourceImage {
    /// Image-loader URI used to render the file without re-reading it.
    pub fn display_uri(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessingState {
    pub is_processing: bool,
    pub error: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Previewing,
    Generating,
    Result,
}

/// Everything the runner needs to perform one generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
    pub id: u64,
    pub path: PathBuf,
    pub mime_type: String,
    pub instruction: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppState {
    source: Option<SourceImage>,
    edited: Option<EditedImage>,
    processing: ProcessingState,
    /// Id of the one generation currently in flight.
    pending: Option<u64>,
    /// Id of the generation that produced `edited`.
    edited_by: Option<u64>,
    serial: u64,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    pub fn edited(&self) -> Option<&EditedImage> {
        self.edited.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.processing.error.as_deref()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.is_processing
    }

    pub fn phase(&self) -> Phase {
        match (&self.source, &self.edited) {
            (None, _) => Phase::Empty,
            _ if self.processing.is_processing => Phase::Generating,
            (Some(_), None) => Phase::Previewing,
            (Some(_), Some(_)) => Phase::Result,
        }
    }

    /// Display URI of the edited image, unique per generation.
    pub fn edited_display_uri(&self) -> Option<String> {
        let edited = self.edited.as_ref()?;
        let id = self.edited_by?;
        let ext = edited.mime_type.strip_prefix("image/").unwrap_or("png");
        Some(format!("bytes://edited-{}.{}", id, ext))
    }

    /// Display references held by this snapshot.
    #[cfg(test)]
    pub fn displays(&self) -> Vec<String> {
        self.source
            .iter()
            .map(SourceImage::display_uri)
            .chain(self.edited_display_uri())
            .collect()
    }

    /// A newly selected image replaces whatever was there and invalidates any
    /// earlier edit, error or in-flight generation.
    pub fn select(&self, file: ImageFile) -> Self {
        let id = self.serial + 1;
        Self {
            source: Some(SourceImage {
                id,
                path: file.path,
                name: file.name,
                mime_type: file.mime_type,
            }),
            edited: None,
            processing: ProcessingState::default(),
            pending: None,
            edited_by: None,
            serial: id,
        }
    }

    /// Validate a picked or dropped file and select it. A rejected file
    /// leaves this snapshot as it is; the error is meant for an alert.
    pub fn open(&self, path: &Path) -> EditResult<Self> {
        let file = upload::validate(path)?;
        Ok(self.select(file))
    }

    /// Start a generation. Returns `None`, leaving nothing changed, when there
    /// is no image, one is already generating, or the prompt is blank.
    pub fn submit(&self, prompt: &str) -> Option<(Self, GenerationRequest)> {
        let source = self.source.as_ref()?;
        if self.processing.is_processing {
            return None;
        }
        let prompt = Prompt::parse(prompt)?;

        let id = self.serial + 1;
        let request = GenerationRequest {
            id,
            path: source.path.clone(),
            mime_type: source.mime_type.clone(),
            instruction: prompt.into_string(),
        };
        let next = Self {
            processing: ProcessingState {
                is_processing: true,
                error: None,
            },
            pending: Some(id),
            serial: id,
            ..self.clone()
        };
        Some((next, request))
    }

    /// Apply the outcome of a generation. Outcomes for anything but the
    /// pending generation are discarded.
    pub fn finish(&self, outcome: GenerationOutcome) -> Self {
        if self.pending != Some(outcome.id) {
            return self.clone();
        }
        match outcome.result {
            Ok(image) => Self {
                edited: Some(image),
                edited_by: Some(outcome.id),
                processing: ProcessingState::default(),
                pending: None,
                ..self.clone()
            },
            Err(message) => Self {
                processing: ProcessingState {
                    is_processing: false,
                    error: Some(message),
                },
                pending: None,
                ..self.clone()
            },
        }
    }

    pub fn dismiss_error(&self) -> Self {
        Self {
            processing: ProcessingState {
                error: None,
                ..self.processing.clone()
            },
            ..self.clone()
        }
    }

    /// Back to `Empty` from anywhere.
    pub fn reset(&self) -> Self {
        Self {
            serial: self.serial,
            ..Self::default()
        }
    }
}

/// Result of one generation, routed back to the state that asked for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub id: u64,
    pub result: Result<EditedImage, String>,
}

/// Display references `prev` held that `next` no longer does.
///
/// A source is released whenever its id changes, even when the new source
/// points at the same path, so the file is read again.
pub fn released_displays(prev: &AppState, next: &AppState) -> Vec<String> {
    let mut released = Vec::new();
    if let Some(source) = &prev.source {
        if next.source.as_ref().map(|s| s.id) != Some(source.id) {
            released.push(source.display_uri());
        }
    }
    if let Some(uri) = prev.edited_display_uri() {
        if next.edited_display_uri().as_deref() != Some(uri.as_str()) {
            released.push(uri);
        }
    }
    released
}
