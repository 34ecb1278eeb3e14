use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::io::Cursor;
use std::path::Path;
use tracing::info;

use crate::client::EditedImage;

impl EditedImage {
    /// Raw image bytes behind the Base64 payload.
    pub fn decode(&self) -> anyhow::Result<Vec<u8>> {
        Ok(STANDARD.decode(self.data.trim())?)
    }
}

/// Pixel size of an encoded image, if its format can be recognised.
pub fn dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Write the edited image to disk exactly as the service returned it.
pub fn save_edited(edited: &EditedImage, path: &Path) -> anyhow::Result<()> {
    let bytes = edited.decode()?;
    std::fs::write(path, &bytes)?;
    info!("Exported {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([255, 0, 0, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_payload() {
        let edited = EditedImage {
            data: "QUJD".to_string(),
            mime_type: "image/png".to_string(),
        };
        assert_eq!(edited.decode().unwrap(), b"ABC");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let edited = EditedImage {
            data: "not base64!".to_string(),
            mime_type: "image/png".to_string(),
        };
        assert!(edited.decode().is_err());
    }

    #[test]
    fn test_dimensions_of_png() {
        assert_eq!(dimensions(&tiny_png()), Some((3, 2)));
        assert_eq!(dimensions(b"ABC"), None);
    }

    #[test]
    fn test_save_writes_decoded_bytes() {
        let png = tiny_png();
        let edited = EditedImage {
            data: STANDARD.encode(&png),
            mime_type: "image/png".to_string(),
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flashedit-generated.png");

        save_edited(&edited, &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), png);
    }
}
