//! Text extraction from photographed documents.
//!
//! Tesseract is only linked with the `ocr` feature. Without it a stub
//! processor is compiled that still validates images but cannot read them.

#[cfg(feature = "ocr")]
pub mod ocr;

#[cfg(not(feature = "ocr"))]
pub mod ocr_stub;

#[cfg(feature = "ocr")]
pub use ocr::OcrProcessor;

#[cfg(not(feature = "ocr"))]
pub use ocr_stub::OcrProcessor;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("The file is not a valid image: {0}")]
    InvalidImage(String),

    #[error("No text could be extracted from the image")]
    NoTextFound,

    #[error("OCR failed: {0}")]
    Failed(String),

    #[error("OCR support is not compiled in (enable the `ocr` feature)")]
    Unavailable,
}

/// Turns image bytes into text.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, image: &[u8]) -> Result<String, OcrError>;
}

/// Decodes `data` and re-encodes it as PNG, normalizing to RGB8.
///
/// Phone photos arrive as JPEG/HEIC-converted/PNG with alpha; Tesseract reads
/// PNG bytes reliably, so every input goes through this step.
pub(crate) fn normalize_image(data: &[u8]) -> Result<Vec<u8>, OcrError> {
    let img = image::load_from_memory(data).map_err(|e| OcrError::InvalidImage(e.to_string()))?;
    let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());

    let mut png_data = Vec::new();
    rgb.write_to(&mut std::io::Cursor::new(&mut png_data), image::ImageFormat::Png)
        .map_err(|e| OcrError::Failed(format!("Failed to convert image: {}", e)))?;
    Ok(png_data)
}

/// Trims OCR output and maps empty results to [`OcrError::NoTextFound`].
#[cfg_attr(not(feature = "ocr"), allow(dead_code))]
pub(crate) fn finish_text(raw: String) -> Result<String, OcrError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(OcrError::NoTextFound);
    }
    Ok(text.to_string())
}

pub(crate) fn language_string(languages: &[String]) -> String {
    if languages.is_empty() {
        "spa+eng".to_string()
    } else {
        languages.join("+")
    }
}
