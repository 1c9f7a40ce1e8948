//! Text Extractor abstraction and registry

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::FileType;

use super::ocr::OcrExtractor;
use super::parser::FileParser;

/// Text of one page, slide or sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    /// 1-indexed page/slide/sheet number, `None` for unpaged formats
    pub page_number: Option<u32>,
    pub text: String,
}

/// Everything extracted from one uploaded file
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub file_type: FileType,
    pub pages: Vec<ExtractedPage>,
}

impl ExtractedText {
    /// Single unpaged body of text
    pub fn single(file_type: FileType, text: String) -> Self {
        Self {
            file_type,
            pages: vec![ExtractedPage {
                page_number: None,
                text,
            }],
        }
    }

    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }
}

/// Converts an uploaded artifact into plain text
///
/// Implementations are blocking; async callers run them on the blocking pool.
pub trait TextExtractor: Send + Sync {
    /// Whether this extractor handles the given type
    fn supports(&self, file_type: FileType) -> bool;

    /// Extract text, or fail with `Error::Extraction`
    fn extract(&self, filename: &str, file_type: FileType, data: &[u8]) -> Result<ExtractedText>;

    /// Extractor name for logging
    fn name(&self) -> &str;
}

/// Dispatches uploads to the first extractor that supports their type
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in parsers plus tesseract OCR for images
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FileParser));
        registry.register(Arc::new(OcrExtractor::default()));
        registry
    }

    pub fn register(&mut self, extractor: Arc<dyn TextExtractor>) {
        self.extractors.push(extractor);
    }

    /// Detect the type of an upload and extract its text
    pub fn extract(
        &self,
        filename: &str,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Result<ExtractedText> {
        let file_type = FileType::detect(filename, content_type);
        if !file_type.is_supported() {
            let ext = filename.rsplit_once('.').map(|(_, e)| e).unwrap_or(filename);
            return Err(Error::UnsupportedFileType(ext.to_string()));
        }

        let extractor = self
            .extractors
            .iter()
            .find(|e| e.supports(file_type))
            .ok_or_else(|| Error::UnsupportedFileType(file_type.display_name().to_string()))?;

        tracing::debug!(
            filename = %filename,
            file_type = file_type.display_name(),
            extractor = extractor.name(),
            "Extracting text"
        );

        extractor.extract(filename, file_type, data)
    }
}
