use tracing::{error, info};

use crate::client::ImageEditor;
use crate::encoder::encode_file;
use crate::state::{GenerationOutcome, GenerationRequest};

/// Encode the source file and ask the editor for one edit.
///
/// Runs to completion; there is no retry and no cancellation. Errors come
/// back as their display text, ready for the banner.
pub async fn execute(editor: &dyn ImageEditor, request: GenerationRequest) -> GenerationOutcome {
    let GenerationRequest {
        id,
        path,
        mime_type,
        instruction,
    } = request;

    info!("Generation {} started: {} chars", id, instruction.len());

    let result = match encode_file(&path).await {
        Ok(base64) => editor.generate_edit(&base64, &mime_type, &instruction).await,
        Err(e) => Err(e),
    };

    match &result {
        Ok(image) => info!("Generation {} finished: {}", id, image.mime_type),
        Err(e) => error!("Generation {} failed: {}", id, e),
    }

    GenerationOutcome {
        id,
        result: result.map_err(|e| e.to_string()),
    }
}
