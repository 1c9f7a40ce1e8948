//! Multi-format file parser
//!
//! Best-effort text extraction for PDF, DOCX, PPTX, CSV, spreadsheets and
//! plain text, keeping page/slide/sheet boundaries where the format has them.

use calamine::Reader;
use std::io::Read;
use std::sync::mpsc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::FileType;

use super::extractor::{ExtractedPage, ExtractedText, TextExtractor};

/// Upper bound for the pdf-extract fallback, which can spin on odd fonts
const PDF_EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

/// Built-in parsers for every non-image type
pub struct FileParser;

impl TextExtractor for FileParser {
    fn supports(&self, file_type: FileType) -> bool {
        file_type.is_supported() && !file_type.needs_ocr()
    }

    fn extract(&self, filename: &str, file_type: FileType, data: &[u8]) -> Result<ExtractedText> {
        Self::parse(filename, file_type, data)
    }

    fn name(&self) -> &str {
        "file-parser"
    }
}

impl FileParser {
    /// Parse a file of a known type
    pub fn parse(filename: &str, file_type: FileType, data: &[u8]) -> Result<ExtractedText> {
        let pages = match file_type {
            FileType::Pdf => Self::parse_pdf(filename, data)?,
            FileType::Docx => Self::parse_docx(filename, data)?,
            FileType::Pptx => Self::parse_pptx(filename, data)?,
            FileType::Txt => Self::parse_text(filename, data)?,
            FileType::Csv => Self::parse_csv(filename, data)?,
            FileType::Xls | FileType::Xlsx => Self::parse_spreadsheet(filename, data)?,
            FileType::Image | FileType::Unknown => {
                return Err(Error::UnsupportedFileType(file_type.display_name().to_string()))
            }
        };

        Ok(ExtractedText { file_type, pages })
    }

    /// PDF page by page with lopdf; whole-document pdf-extract if that yields nothing
    fn parse_pdf(filename: &str, data: &[u8]) -> Result<Vec<ExtractedPage>> {
        let pages = match lopdf::Document::load_mem(data) {
            Ok(doc) => doc
                .get_pages()
                .keys()
                .filter_map(|&page_number| {
                    let text = doc.extract_text(&[page_number]).ok()?;
                    let text = cleanup_pdf_text(&text);
                    (!text.is_empty()).then_some(ExtractedPage {
                        page_number: Some(page_number),
                        text,
                    })
                })
                .collect(),
            Err(e) => {
                tracing::debug!(filename = %filename, error = %e, "lopdf could not load PDF");
                Vec::new()
            }
        };

        if !pages.is_empty() {
            return Ok(pages);
        }

        tracing::warn!(filename = %filename, "Per-page PDF extraction found no text, trying pdf-extract");
        let text = cleanup_pdf_text(&Self::extract_pdf_with_timeout(filename, data)?);
        if text.is_empty() {
            return Err(Error::extraction(
                filename,
                "PDF appears to be image-based or has no extractable text",
            ));
        }

        Ok(vec![ExtractedPage {
            page_number: Some(1),
            text,
        }])
    }

    /// Run pdf-extract on a helper thread so a pathological file cannot hang ingest
    fn extract_pdf_with_timeout(filename: &str, data: &[u8]) -> Result<String> {
        let data = data.to_vec();
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            let _ = tx.send(pdf_extract::extract_text_from_mem(&data));
        });

        match rx.recv_timeout(PDF_EXTRACT_TIMEOUT) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(Error::extraction(filename, format!("Failed to read PDF: {}", e))),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::extraction(
                filename,
                format!("PDF extraction timed out after {:?}", PDF_EXTRACT_TIMEOUT),
            )),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(Error::extraction(filename, "PDF extraction thread crashed"))
            }
        }
    }

    /// DOCX paragraphs and table cells, in document order
    fn parse_docx(filename: &str, data: &[u8]) -> Result<Vec<ExtractedPage>> {
        let doc = docx_rs::read_docx(data).map_err(|e| Error::extraction(filename, e.to_string()))?;

        let mut lines = Vec::new();
        for child in doc.document.children {
            match child {
                docx_rs::DocumentChild::Paragraph(p) => lines.push(paragraph_text(&p)),
                docx_rs::DocumentChild::Table(table) => {
                    for row in &table.rows {
                        let docx_rs::TableChild::TableRow(row) = row;
                        let cells: Vec<String> = row
                            .cells
                            .iter()
                            .map(|cell| {
                                let docx_rs::TableRowChild::TableCell(cell) = cell;
                                cell.children
                                    .iter()
                                    .filter_map(|c| match c {
                                        docx_rs::TableCellContent::Paragraph(p) => {
                                            Some(paragraph_text(p))
                                        }
                                        _ => None,
                                    })
                                    .collect::<Vec<_>>()
                                    .join(" ")
                            })
                            .collect();
                        lines.push(cells.join(" | "));
                    }
                }
                _ => {}
            }
        }

        Ok(vec![ExtractedPage {
            page_number: None,
            text: lines.join("\n"),
        }])
    }

    /// PPTX, one page per slide
    fn parse_pptx(filename: &str, data: &[u8]) -> Result<Vec<ExtractedPage>> {
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(data))
            .map_err(|e| Error::extraction(filename, e.to_string()))?;

        // ppt/slides/slide1.xml, slide2.xml, ... sorted numerically
        let mut slides: Vec<(u32, String)> = archive
            .file_names()
            .filter_map(|name| {
                let number = name
                    .strip_prefix("ppt/slides/slide")?
                    .strip_suffix(".xml")?
                    .parse()
                    .ok()?;
                Some((number, name.to_string()))
            })
            .collect();
        slides.sort();

        let mut pages = Vec::new();
        for (slide_number, name) in slides {
            let mut xml = String::new();
            match archive.by_name(&name) {
                Ok(mut file) => {
                    if let Err(e) = file.read_to_string(&mut xml) {
                        tracing::debug!(filename = %filename, slide = slide_number, error = %e, "Unreadable slide");
                        continue;
                    }
                }
                Err(_) => continue,
            }

            let text = extract_text_from_pptx_xml(&xml);
            if !text.is_empty() {
                pages.push(ExtractedPage {
                    page_number: Some(slide_number),
                    text,
                });
            }
        }

        Ok(pages)
    }

    /// Plain text must be valid UTF-8; a leading BOM is dropped
    fn parse_text(filename: &str, data: &[u8]) -> Result<Vec<ExtractedPage>> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::extraction(filename, format!("Text is not valid UTF-8: {}", e)))?;

        Ok(vec![ExtractedPage {
            page_number: None,
            text: text.trim_start_matches('\u{feff}').to_string(),
        }])
    }

    /// CSV rows joined with ` | `, header first
    fn parse_csv(filename: &str, data: &[u8]) -> Result<Vec<ExtractedPage>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(false)
            .from_reader(data);

        let mut text = String::new();
        for record in reader.records() {
            let record = record.map_err(|e| Error::extraction(filename, e.to_string()))?;
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            text.push_str(&record.iter().collect::<Vec<_>>().join(" | "));
            text.push('\n');
        }

        Ok(vec![ExtractedPage {
            page_number: None,
            text,
        }])
    }

    /// XLS/XLSX, one page per sheet
    fn parse_spreadsheet(filename: &str, data: &[u8]) -> Result<Vec<ExtractedPage>> {
        let mut workbook = calamine::open_workbook_auto_from_rs(std::io::Cursor::new(data))
            .map_err(|e| Error::extraction(filename, e.to_string()))?;

        let mut pages = Vec::new();
        for (index, sheet_name) in workbook.sheet_names().to_vec().into_iter().enumerate() {
            let Ok(range) = workbook.worksheet_range(&sheet_name) else {
                continue;
            };

            let mut text = format!("Sheet: {}\n", sheet_name);
            let mut rows = 0usize;
            for row in range.rows() {
                let cells: Vec<String> = row.iter().map(cell_text).collect();
                if cells.iter().all(|c| c.is_empty()) {
                    continue;
                }
                text.push_str(&cells.join(" | "));
                text.push('\n');
                rows += 1;
            }

            if rows > 0 {
                pages.push(ExtractedPage {
                    page_number: Some(index as u32 + 1),
                    text,
                });
            }
        }

        Ok(pages)
    }
}

fn paragraph_text(paragraph: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        if let docx_rs::ParagraphChild::Run(run) = child {
            for child in &run.children {
                if let docx_rs::RunChild::Text(t) = child {
                    text.push_str(&t.text);
                }
            }
        }
    }
    text
}

fn cell_text(cell: &calamine::Data) -> String {
    match cell {
        calamine::Data::Empty => String::new(),
        calamine::Data::String(s) => s.trim().to_string(),
        calamine::Data::Float(f) => f.to_string(),
        calamine::Data::Int(i) => i.to_string(),
        calamine::Data::Bool(b) => b.to_string(),
        calamine::Data::DateTime(dt) => dt.to_string(),
        calamine::Data::DateTimeIso(s) | calamine::Data::DurationIso(s) => s.clone(),
        calamine::Data::Error(_) => String::new(),
    }
}

/// Text runs (`<a:t>`) of a slide, one line per paragraph (`<a:p>`)
fn extract_text_from_pptx_xml(xml: &str) -> String {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(e)) if in_text => {
                if let Ok(text) = e.unescape() {
                    line.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        lines.push(trimmed.to_string());
                    }
                    line.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    let trimmed = line.trim();
    if !trimmed.is_empty() {
        lines.push(trimmed.to_string());
    }
    lines.join("\n")
}

/// Normalise typographic glyphs and drop blank lines from PDF text
fn cleanup_pdf_text(text: &str) -> String {
    text.replace('\0', "")
        .replace(['\u{2010}', '\u{2011}', '\u{2013}'], "-")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2026}', "...")
        .replace('\u{00A0}', " ")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB00}', "ff")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
