//! Stand-in used when the crate is built without the `ocr` feature.

use super::{language_string, normalize_image, OcrError, TextExtractor};

#[derive(Clone)]
pub struct OcrProcessor {
    languages: String,
}

impl OcrProcessor {
    pub fn new(languages: &[String]) -> Self {
        Self {
            languages: language_string(languages),
        }
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }
}

impl TextExtractor for OcrProcessor {
    fn extract_text(&self, image: &[u8]) -> Result<String, OcrError> {
        // Invalid uploads are still reported as such.
        normalize_image(image)?;
        log::warn!("OCR requested but doclara was built without the `ocr` feature");
        Err(OcrError::Unavailable)
    }
}
