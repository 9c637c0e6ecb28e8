//! Canvas raster snapshots

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Encoded raster snapshot of the drawing canvas, stored as a data URL.
///
/// The payload is opaque to sync and sharing; only the CLI import/export
/// paths decode it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanvasImage(String);

impl CanvasImage {
    /// Wrap an already-encoded data URL.
    pub fn from_data_url(data_url: impl Into<String>) -> Self {
        Self(data_url.into())
    }

    /// A cleared canvas.
    #[must_use]
    pub const fn empty() -> Self {
        Self(String::new())
    }

    /// Encode PNG bytes into a data URL snapshot.
    #[must_use]
    pub fn from_png_bytes(bytes: &[u8]) -> Self {
        Self(format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(bytes)))
    }

    /// Decode the PNG bytes back out of the data URL.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let payload = self.0.strip_prefix(PNG_DATA_URL_PREFIX).ok_or_else(|| {
            Error::Invalid("Canvas snapshot is not a PNG data URL".to_string())
        })?;
        STANDARD
            .decode(payload)
            .map_err(|error| Error::Invalid(format!("Canvas snapshot is not valid base64: {error}")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_bytes_survive_data_url_encoding() {
        let bytes = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 1, 2];
        let image = CanvasImage::from_png_bytes(&bytes);
        assert!(image.as_str().starts_with("data:image/png;base64,"));
        assert_eq!(image.to_png_bytes().unwrap(), bytes);
    }

    #[test]
    fn non_png_data_url_is_rejected() {
        let image = CanvasImage::from_data_url("data:image/jpeg;base64,AAAA");
        assert!(matches!(image.to_png_bytes(), Err(Error::Invalid(_))));
    }

    #[test]
    fn empty_canvas_reports_empty() {
        assert!(CanvasImage::empty().is_empty());
        assert!(!CanvasImage::from_png_bytes(b"x").is_empty());
    }
}
