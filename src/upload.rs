use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{EditError, EditResult};

/// A candidate file that passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageFile {
    pub path: PathBuf,
    pub name: String,
    pub mime_type: String,
}

/// Extensions offered by the file picker.
pub const PICKER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bmp"];

/// Declared MIME type of a file, judged by its extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "avif" => "image/avif",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Accept a file only if its declared type is `image/*`.
///
/// The file picker and drag-and-drop both come through here.
pub fn validate(path: &Path) -> EditResult<ImageFile> {
    let mime_type = mime_for_path(path);
    if !mime_type.starts_with("image/") {
        warn!("Rejected {} ({})", path.display(), mime_type);
        return Err(EditError::invalid_file_type(mime_type));
    }

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image")
        .to_string();
    info!("Accepted {} as {}", name, mime_type);

    Ok(ImageFile {
        path: path.to_path_buf(),
        name,
        mime_type: mime_type.to_string(),
    })
}
