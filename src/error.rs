//! Error types for the edit pipeline.
//!
//! Every variant except [`EditError::InvalidFileType`] ends up as the text of
//! the dismissible error banner.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditError {
    /// Rejected at selection time; never routed through the processing state.
    #[error("Please upload an image file ({mime_type} is not supported)")]
    InvalidFileType { mime_type: String },

    /// The source file could not be read before the request was sent.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The service answered but no part of the answer was an image.
    #[error("The model did not return an image. Try rephrasing your instruction.")]
    NoImageReturned,

    /// Network failure, non-success status (auth, quota) or unreadable body.
    #[error("{0}")]
    Transport(String),

    #[error("Describe the edit you want before generating")]
    EmptyInstruction,

    #[error("{0}")]
    Config(String),
}

impl EditError {
    pub fn transport<T: Into<String>>(msg: T) -> Self {
        Self::Transport(msg.into())
    }

    pub fn invalid_file_type(mime_type: impl Into<String>) -> Self {
        Self::InvalidFileType {
            mime_type: mime_type.into(),
        }
    }
}

pub type EditResult<T> = Result<T, EditError>;
