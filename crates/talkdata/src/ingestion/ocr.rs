//! Image OCR via the `tesseract` command-line tool

use std::io::Write;
use std::process::Command;

use crate::error::{Error, Result};
use crate::types::FileType;

use super::extractor::{ExtractedText, TextExtractor};

/// Extracts text from PNG/JPEG images with tesseract
#[derive(Debug, Clone)]
pub struct OcrExtractor {
    /// tesseract binary name or path
    command: String,
    /// tesseract language codes, e.g. `eng` or `eng+urd`
    languages: String,
}

impl Default for OcrExtractor {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl OcrExtractor {
    pub fn new(command: impl Into<String>, languages: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            languages: languages.into(),
        }
    }

    /// Whether the tesseract binary can be run
    pub fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl TextExtractor for OcrExtractor {
    fn supports(&self, file_type: FileType) -> bool {
        file_type.needs_ocr()
    }

    fn extract(&self, filename: &str, file_type: FileType, data: &[u8]) -> Result<ExtractedText> {
        let mut image = tempfile::Builder::new()
            .prefix("talkdata-ocr-")
            .tempfile()
            .map_err(|e| Error::extraction(filename, format!("Failed to create temp file: {}", e)))?;
        image
            .write_all(data)
            .and_then(|_| image.flush())
            .map_err(|e| Error::extraction(filename, format!("Failed to write temp image: {}", e)))?;

        let output = Command::new(&self.command)
            .arg(image.path())
            .arg("stdout")
            .args(["-l", &self.languages])
            .output()
            .map_err(|e| {
                Error::extraction(
                    filename,
                    format!("Image OCR requires tesseract ({}): {}", self.command, e),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::extraction(filename, format!("tesseract error: {}", stderr.trim())));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        tracing::info!(filename = %filename, characters = text.len(), "Image OCR complete");

        Ok(ExtractedText::single(file_type, text))
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_images_only() {
        let ocr = OcrExtractor::default();
        assert!(ocr.supports(FileType::Image));
        assert!(!ocr.supports(FileType::Pdf));
    }

    #[test]
    fn test_missing_binary_is_extraction_error() {
        let ocr = OcrExtractor::new("talkdata-no-such-tesseract", "eng");
        assert!(!ocr.is_available());

        let err = ocr.extract("scan.png", FileType::Image, b"\x89PNG").unwrap_err();
        assert!(matches!(err, Error::Extraction { filename, .. } if filename == "scan.png"));
    }
}
