//! Batch ingest: many uploads in, one Document out

use bytes::Bytes;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::response::{AcceptedFile, SkippedFile};
use crate::types::{Document, Section};

use super::extractor::{ExtractedText, ExtractorRegistry};

/// Separator between files and between pages of one file
const PART_SEPARATOR: &str = "\n\n";

/// One uploaded file
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    /// Declared MIME type, if the client sent one
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Upload {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Result of ingesting a batch
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Combined document, `None` when every file was skipped
    pub document: Option<Document>,
    pub accepted: Vec<AcceptedFile>,
    pub skipped: Vec<SkippedFile>,
}

/// Extract every upload on the blocking pool and combine the survivors
///
/// A file that fails extraction, or yields only whitespace, is skipped with a
/// reason; the rest of the batch continues.
pub async fn ingest_batch(registry: Arc<ExtractorRegistry>, uploads: Vec<Upload>) -> IngestOutcome {
    let tasks = uploads.into_iter().map(|upload| {
        let registry = registry.clone();
        async move {
            let filename = upload.filename.clone();
            let result = tokio::task::spawn_blocking(move || {
                registry.extract(&upload.filename, upload.content_type.as_deref(), &upload.data)
            })
            .await
            .map_err(|e| Error::internal(format!("Extraction task failed: {}", e)))
            .and_then(|r| r);
            (filename, result)
        }
    });

    // join_all keeps upload order
    let results = futures::future::join_all(tasks).await;
    assemble(results)
}

/// Combine per-file extraction results into one document, in order
pub fn assemble(results: Vec<(String, Result<ExtractedText>)>) -> IngestOutcome {
    let mut text = String::new();
    let mut sections = Vec::new();
    let mut accepted = Vec::new();
    let mut skipped = Vec::new();

    for (filename, result) in results {
        let extracted = match result {
            Ok(extracted) if !extracted.is_blank() => extracted,
            Ok(_) => {
                tracing::warn!(filename = %filename, "Skipped file with no extractable text");
                skipped.push(SkippedFile {
                    filename,
                    reason: "no extractable text".to_string(),
                });
                continue;
            }
            Err(e) => {
                tracing::warn!(filename = %filename, error = %e, "Skipped file");
                skipped.push(SkippedFile {
                    filename,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let file_start = text.len();
        let mut file_sections = 0;
        for page in &extracted.pages {
            let page_text = page.text.trim();
            if page_text.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push_str(PART_SEPARATOR);
            }
            let start = text.len();
            text.push_str(page_text);
            sections.push(Section {
                filename: filename.clone(),
                page_number: page.page_number,
                start,
                end: text.len(),
            });
            file_sections += 1;
        }

        let characters = text[file_start..].trim_start().chars().count();
        tracing::info!(
            filename = %filename,
            file_type = extracted.file_type.display_name(),
            sections = file_sections,
            characters,
            "Extracted file"
        );
        accepted.push(AcceptedFile {
            filename,
            file_type: extracted.file_type,
            sections: file_sections,
            characters,
        });
    }

    let document = (!accepted.is_empty()).then(|| Document::with_sections(text, sections));

    IngestOutcome {
        document,
        accepted,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::extractor::ExtractedPage;
    use crate::types::FileType;

    fn paged(pages: &[(u32, &str)]) -> ExtractedText {
        ExtractedText {
            file_type: FileType::Pdf,
            pages: pages
                .iter()
                .map(|(n, t)| ExtractedPage {
                    page_number: Some(*n),
                    text: t.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_assemble_joins_files_and_records_sections() {
        let outcome = assemble(vec![
            ("a.pdf".to_string(), Ok(paged(&[(1, "page one"), (2, " "), (3, "page three")]))),
            ("bad.docx".to_string(), Err(Error::extraction("bad.docx", "corrupt"))),
            ("notes.txt".to_string(), Ok(ExtractedText::single(FileType::Txt, "notes\n".into()))),
        ]);

        let doc = outcome.document.unwrap();
        assert_eq!(doc.text, "page one\n\npage three\n\nnotes");
        assert_eq!(doc.sections.len(), 3);
        assert_eq!(doc.section_at(12).and_then(|s| s.page_number), Some(3));
        assert_eq!(doc.section_at(doc.text.len() - 1).map(|s| s.filename.as_str()), Some("notes.txt"));

        assert_eq!(outcome.accepted.len(), 2);
        assert_eq!(outcome.accepted[0].sections, 2);
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].reason.contains("corrupt"));
    }

    #[test]
    fn test_all_skipped_yields_no_document() {
        let outcome = assemble(vec![
            ("blank.txt".to_string(), Ok(ExtractedText::single(FileType::Txt, "  ".into()))),
            ("x.zip".to_string(), Err(Error::UnsupportedFileType("zip".into()))),
        ]);

        assert!(outcome.document.is_none());
        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.skipped.len(), 2);
        assert_eq!(outcome.skipped[0].reason, "no extractable text");
    }

    #[tokio::test]
    async fn test_ingest_batch_keeps_upload_order() {
        let registry = Arc::new(ExtractorRegistry::with_defaults());
        let outcome = ingest_batch(
            registry,
            vec![
                Upload::new("first.txt", "Alice likes apples."),
                Upload::new("broken.txt", vec![0xffu8, 0xfe]),
                Upload::new("second.csv", "Bob,oranges\n").with_content_type("text/csv"),
            ],
        )
        .await;

        let doc = outcome.document.unwrap();
        assert_eq!(doc.text, "Alice likes apples.\n\nBob | oranges");
        assert_eq!(outcome.skipped[0].filename, "broken.txt");
        assert_eq!(
            outcome.accepted.iter().map(|a| a.filename.as_str()).collect::<Vec<_>>(),
            vec!["first.txt", "second.csv"]
        );
    }
}
