use std::sync::Arc;

use super::{finish_text, language_string, normalize_image, OcrError, TextExtractor};

#[derive(Clone)]
pub struct OcrProcessor {
    inner: Arc<OcrProcessorInner>,
}

struct OcrProcessorInner {
    languages: String,
}

impl OcrProcessor {
    pub fn new(languages: &[String]) -> Self {
        Self {
            inner: Arc::new(OcrProcessorInner {
                languages: language_string(languages),
            }),
        }
    }

    pub fn languages(&self) -> &str {
        &self.inner.languages
    }
}

impl TextExtractor for OcrProcessor {
    fn extract_text(&self, image: &[u8]) -> Result<String, OcrError> {
        let _span = tracing::info_span!("processor.ocr", bytes = image.len()).entered();

        let png_data = normalize_image(image)?;

        // LepTess is not Sync; a fresh instance per call keeps the processor shareable.
        let mut lt = leptess::LepTess::new(None, &self.inner.languages)
            .map_err(|e| OcrError::Failed(format!("Failed to initialize Tesseract: {}", e)))?;

        lt.set_image_from_mem(&png_data)
            .map_err(|e| OcrError::Failed(format!("Failed to set image for OCR: {}", e)))?;

        let text = lt
            .get_utf8_text()
            .map_err(|e| OcrError::Failed(format!("OCR failed: {}", e)))?;

        log::debug!("OCR produced {} characters", text.chars().count());
        finish_text(text)
    }
}
