//! Text chunking with byte-span tracking
//!
//! Text is first cut into pieces at the coarsest boundary that makes them fit
//! (paragraph, line, sentence, word, and finally raw characters), then pieces
//! are merged greedily into chunks of at most `chunk_size` characters. When a
//! chunk is closed, its trailing pieces totalling at most `overlap` characters
//! open the next one.
//!
//! Chunks are exact byte ranges of the input, so every chunk after the first
//! starts at or before the end of its predecessor and ends strictly after it.
//! Concatenating `text[prev_end..end]` over the sequence rebuilds the input.

use std::collections::VecDeque;
use std::ops::Range;

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::types::{Chunk, Document};

/// Split levels, coarsest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
    Char,
}

impl Boundary {
    fn finer(self) -> Self {
        match self {
            Self::Paragraph => Self::Line,
            Self::Line => Self::Sentence,
            Self::Sentence => Self::Word,
            Self::Word | Self::Char => Self::Char,
        }
    }
}

/// Text chunker with configurable size and overlap, both in characters
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker; requires `chunk_size > 0` and `overlap < chunk_size`
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        ChunkingConfig {
            chunk_size,
            chunk_overlap: overlap,
        }
        .validate()?;
        Ok(Self { chunk_size, overlap })
    }

    /// Create from configuration
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Chunk a document, attaching page/file provenance to each chunk
    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        self.split(&doc.text)
            .into_iter()
            .enumerate()
            .map(|(i, span)| Chunk::from_span(doc, i as u32, span))
            .collect()
    }

    /// Split text into chunk byte ranges
    pub fn split(&self, text: &str) -> Vec<Range<usize>> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        self.split_pieces(text, 0..text.len(), Boundary::Paragraph, &mut pieces);
        self.merge(text, &pieces)
    }

    /// Cut `span` into contiguous pieces no longer than `chunk_size`
    fn split_pieces(
        &self,
        text: &str,
        span: Range<usize>,
        boundary: Boundary,
        out: &mut Vec<Range<usize>>,
    ) {
        let slice = &text[span.clone()];
        if char_len(slice) <= self.chunk_size {
            out.push(span);
            return;
        }

        let segments = self.segments(slice, boundary);
        if segments.len() <= 1 && boundary != Boundary::Char {
            self.split_pieces(text, span, boundary.finer(), out);
            return;
        }

        for segment in segments {
            let absolute = span.start + segment.start..span.start + segment.end;
            if char_len(&text[absolute.clone()]) > self.chunk_size {
                self.split_pieces(text, absolute, boundary.finer(), out);
            } else {
                out.push(absolute);
            }
        }
    }

    /// Relative ranges of `slice` at one boundary level
    fn segments(&self, slice: &str, boundary: Boundary) -> Vec<Range<usize>> {
        match boundary {
            Boundary::Paragraph => split_after(slice, "\n\n"),
            Boundary::Line => split_after(slice, "\n"),
            Boundary::Sentence => slice
                .split_sentence_bound_indices()
                .map(|(i, s)| i..i + s.len())
                .collect(),
            Boundary::Word => slice
                .split_word_bound_indices()
                .map(|(i, s)| i..i + s.len())
                .collect(),
            Boundary::Char => {
                let mut spans = Vec::new();
                let mut start = 0;
                let mut count = 0;
                for (idx, _) in slice.char_indices() {
                    if count == self.chunk_size {
                        spans.push(start..idx);
                        start = idx;
                        count = 0;
                    }
                    count += 1;
                }
                spans.push(start..slice.len());
                spans
            }
        }
    }

    /// Greedily merge pieces into chunks, carrying an overlap tail forward
    fn merge(&self, text: &str, pieces: &[Range<usize>]) -> Vec<Range<usize>> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut window_len = 0usize;

        for piece in pieces {
            let len = char_len(&text[piece.clone()]);

            if !window.is_empty() && window_len + len > self.chunk_size {
                chunks.push(window_span(&window));

                while window_len > self.overlap
                    || (window_len > 0 && window_len + len > self.chunk_size)
                {
                    match window.pop_front() {
                        Some((_, popped)) => window_len -= popped,
                        None => break,
                    }
                }
            }

            window.push_back((piece.clone(), len));
            window_len += len;
        }

        if !window.is_empty() {
            chunks.push(window_span(&window));
        }

        chunks
    }
}

fn window_span(window: &VecDeque<(Range<usize>, usize)>) -> Range<usize> {
    let start = window.front().map(|(r, _)| r.start).unwrap_or(0);
    let end = window.back().map(|(r, _)| r.end).unwrap_or(start);
    start..end
}

/// Split keeping each separator attached to the piece before it
fn split_after(slice: &str, separator: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (idx, matched) in slice.match_indices(separator) {
        let end = idx + matched.len();
        spans.push(start..end);
        start = end;
    }
    if start < slice.len() {
        spans.push(start..slice.len());
    }
    spans
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Rebuild the original text from chunk ranges by taking each chunk's
/// non-overlapping tail
pub fn reconstruct(text: &str, spans: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut covered = 0usize;
    for span in spans {
        let from = covered.max(span.start);
        if from < span.end {
            out.push_str(&text[from..span.end]);
        }
        covered = covered.max(span.end);
    }
    out
}
