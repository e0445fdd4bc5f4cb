//! Input normalizer: turns an uploaded payload into a single text blob.

use tracing::{debug, info, warn};

use super::ocr::OcrCell;
use crate::error::ExtractionError;

/// How a payload is turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Image,
    Text,
}

impl PayloadKind {
    /// Classify by MIME type. Anything that is not `image/*` is read as text.
    pub fn classify(mime_type: &str) -> Self {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence.starts_with("image/") {
            PayloadKind::Image
        } else {
            PayloadKind::Text
        }
    }
}

/// Produces UTF-8 requirements text from uploaded bytes.
pub struct InputNormalizer {
    ocr: OcrCell,
}

impl InputNormalizer {
    pub fn new(ocr: OcrCell) -> Self {
        Self { ocr }
    }

    /// Normalize `payload` according to `mime_type`.
    ///
    /// Images go through OCR and must yield non-blank text. Everything else is
    /// decoded as UTF-8; invalid sequences are replaced rather than rejected.
    pub async fn normalize(
        &self,
        payload: &[u8],
        mime_type: &str,
    ) -> Result<String, ExtractionError> {
        match PayloadKind::classify(mime_type) {
            PayloadKind::Image => {
                info!(bytes = payload.len(), mime_type, "Running OCR on uploaded image");
                let engine = self.ocr.get_or_init().await?;
                let text = engine.recognize(payload).await?;
                let text = text.trim();
                if text.is_empty() {
                    return Err(ExtractionError::NoTextRecognized);
                }
                debug!(chars = text.len(), "OCR recognized text");
                Ok(text.to_string())
            }
            PayloadKind::Text => {
                let text = decode_text(payload);
                if text.trim().is_empty() {
                    return Err(ExtractionError::EmptyDocument);
                }
                Ok(text)
            }
        }
    }
}

fn decode_text(payload: &[u8]) -> String {
    let payload = payload.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(payload);
    match std::str::from_utf8(payload) {
        Ok(s) => s.to_string(),
        Err(e) => {
            warn!(valid_up_to = e.valid_up_to(), "Upload is not valid UTF-8, replacing invalid bytes");
            String::from_utf8_lossy(payload).into_owned()
        }
    }
}
