use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;
use tracing::debug;

use crate::error::{EditError, EditResult};

/// Read a file and return its contents as a bare Base64 string.
///
/// No data-URI prefix is added; the caller already knows the MIME type from
/// the file metadata. No size or type checks happen here.
pub async fn encode_file(path: &Path) -> EditResult<String> {
    let bytes = tokio::fs::read(path).await.map_err(|source| EditError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Encoding {} ({} bytes)", path.display(), bytes.len());
    Ok(STANDARD.encode(bytes))
}
