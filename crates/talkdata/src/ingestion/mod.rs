//! Document ingestion: text extraction, batch assembly and chunking

mod chunker;
mod extractor;
mod ingest;
mod ocr;
mod parser;

pub use chunker::{reconstruct, TextChunker};
pub use extractor::{ExtractedPage, ExtractedText, ExtractorRegistry, TextExtractor};
pub use ingest::{assemble, ingest_batch, IngestOutcome, Upload};
pub use ocr::OcrExtractor;
pub use parser::FileParser;
