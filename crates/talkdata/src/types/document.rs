//! Document and chunk types with provenance tracking for citations

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ops::Range;
use uuid::Uuid;

/// Supported upload types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Microsoft PowerPoint presentation (.pptx)
    Pptx,
    /// Plain text file
    Txt,
    /// CSV file
    Csv,
    /// Old Excel spreadsheet (.xls)
    Xls,
    /// Excel spreadsheet (.xlsx)
    Xlsx,
    /// PNG or JPEG image, read with OCR
    Image,
    /// Unknown file type
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "pptx" => Self::Pptx,
            "txt" | "text" => Self::Txt,
            "csv" => Self::Csv,
            "xls" => Self::Xls,
            "xlsx" => Self::Xlsx,
            "png" | "jpg" | "jpeg" => Self::Image,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a filename's extension
    pub fn from_filename(filename: &str) -> Self {
        match filename.rsplit_once('.') {
            Some((_, ext)) => Self::from_extension(ext),
            None => Self::Unknown,
        }
    }

    /// Detect file type from a MIME type
    pub fn from_mime(mime: &str) -> Self {
        match mime {
            "application/pdf" => Self::Pdf,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Self::Docx,
            "application/vnd.openxmlformats-officedocument.presentationml.presentation" => Self::Pptx,
            "text/plain" => Self::Txt,
            "text/csv" => Self::Csv,
            "application/vnd.ms-excel" => Self::Xls,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Self::Xlsx,
            "image/png" | "image/jpeg" => Self::Image,
            _ => Self::Unknown,
        }
    }

    /// Detect from an upload: declared MIME first, then the filename
    pub fn detect(filename: &str, content_type: Option<&str>) -> Self {
        let declared = content_type.map(Self::from_mime).unwrap_or(Self::Unknown);
        if declared.is_supported() {
            return declared;
        }

        let by_name = Self::from_filename(filename);
        if by_name.is_supported() {
            return by_name;
        }

        mime_guess::from_path(filename)
            .first()
            .map(|mime| Self::from_mime(mime.essence_str()))
            .unwrap_or(Self::Unknown)
    }

    /// Check if this is a supported file type
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Whether text comes from OCR rather than a parser
    pub fn needs_ocr(&self) -> bool {
        matches!(self, Self::Image)
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Docx => "Word Document (.docx)",
            Self::Pptx => "PowerPoint (.pptx)",
            Self::Txt => "Text File",
            Self::Csv => "CSV",
            Self::Xls => "Excel Spreadsheet (.xls)",
            Self::Xlsx => "Excel Spreadsheet (.xlsx)",
            Self::Image => "Image",
            Self::Unknown => "Unknown",
        }
    }
}

/// A span of the document text that came from one file, page, slide or sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Original filename as uploaded
    pub filename: String,
    /// Page, slide or sheet number (1-indexed), when the format has one
    pub page_number: Option<u32>,
    /// Byte offset where the section starts
    pub start: usize,
    /// Byte offset where the section ends (exclusive)
    pub end: usize,
}

impl Section {
    /// Whether a byte offset falls inside this section
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }
}

/// The text submitted for one session
///
/// Immutable after creation. Provenance is best-effort: a document built from
/// raw text has no sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Raw text
    pub text: String,
    /// SHA-256 of the text (hex); the retrieval cache key
    pub content_hash: String,
    /// Per-file / per-page provenance, ordered by offset
    pub sections: Vec<Section>,
    /// Creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    /// Create a document from raw text with no provenance
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::with_sections(text, Vec::new())
    }

    /// Create a document with section provenance
    pub fn with_sections(text: impl Into<String>, sections: Vec<Section>) -> Self {
        let text = text.into();
        Self {
            id: Uuid::new_v4(),
            content_hash: hash_content(&text),
            text,
            sections,
            created_at: chrono::Utc::now(),
        }
    }

    /// True when there is nothing but whitespace to answer from
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Retrieval cache key: the content hash, extended with provenance when
    /// the document has sections so citations never borrow another upload's
    /// filenames
    pub fn cache_key(&self) -> String {
        if self.sections.is_empty() {
            return self.content_hash.clone();
        }

        let mut hasher = Sha256::new();
        hasher.update(self.content_hash.as_bytes());
        for section in &self.sections {
            hasher.update(section.filename.as_bytes());
            hasher.update(section.page_number.unwrap_or(0).to_le_bytes());
            hasher.update((section.start as u64).to_le_bytes());
            hasher.update((section.end as u64).to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Section containing the given byte offset
    pub fn section_at(&self, offset: usize) -> Option<&Section> {
        // sections are sorted and non-overlapping
        let idx = self.sections.partition_point(|s| s.end <= offset);
        self.sections.get(idx).filter(|s| s.contains(offset))
    }
}

/// A contiguous piece of a document, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Parent document ID
    pub document_id: Uuid,
    /// Position in the document's chunk sequence
    pub index: u32,
    /// Exact text of `document.text[char_start..char_end]`
    pub content: String,
    /// Byte offset where the chunk starts
    pub char_start: usize,
    /// Byte offset where the chunk ends (exclusive)
    pub char_end: usize,
    /// Page/slide/sheet the chunk starts on
    pub page_number: Option<u32>,
    /// File the chunk came from
    pub filename: Option<String>,
}

impl Chunk {
    /// Create a chunk from a byte range of the document
    pub fn from_span(document: &Document, index: u32, span: Range<usize>) -> Self {
        let section = document.section_at(span.start);
        Self {
            document_id: document.id,
            index,
            content: document.text[span.clone()].to_string(),
            char_start: span.start,
            char_end: span.end,
            page_number: section.and_then(|s| s.page_number),
            filename: section.map(|s| s.filename.clone()),
        }
    }

    /// Human-readable source label, e.g. `report.pdf, Page 3`
    pub fn source_label(&self) -> Option<String> {
        match (&self.filename, self.page_number) {
            (Some(name), Some(page)) => Some(format!("{}, Page {}", name, page)),
            (Some(name), None) => Some(name.clone()),
            (None, Some(page)) => Some(format!("Page {}", page)),
            (None, None) => None,
        }
    }
}

/// Hash content for cache keys
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
