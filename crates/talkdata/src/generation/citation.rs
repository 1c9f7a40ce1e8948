//! Citation extraction and linking
//!
//! Reference markers are parsed from free text, so the table is only as
//! reliable as the model's adherence to the numbering instruction. Numbers
//! that do not index a submitted context entry are dropped, never guessed.

use regex::{Regex, RegexBuilder};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use crate::retrieval::RetrievedChunk;
use crate::types::response::Citation;

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("Invalid regex"))
}

/// Distinct `[n]` reference numbers in an answer, ascending
///
/// Numbers too large for `u32` cannot index any context and are skipped.
pub fn extract_reference_numbers(answer: &str) -> BTreeSet<u32> {
    reference_pattern()
        .captures_iter(answer)
        .filter_map(|cap| cap.get(1).and_then(|m| m.as_str().parse().ok()))
        .collect()
}

/// Build the citation table for an answer against the context it was given
///
/// `context[i]` is reference number `i + 1`. Returns the table and the
/// reference numbers that had no matching entry.
pub fn build_citations(
    answer: &str,
    context: &[RetrievedChunk],
    excerpt_chars: usize,
    question: &str,
) -> (BTreeMap<u32, Citation>, Vec<u32>) {
    let terms = query_terms(question);
    let mut citations = BTreeMap::new();
    let mut dropped = Vec::new();

    for reference in extract_reference_numbers(answer) {
        let entry = (reference as usize)
            .checked_sub(1)
            .and_then(|i| context.get(i));

        let Some(entry) = entry else {
            dropped.push(reference);
            continue;
        };

        let excerpt = truncate_snippet(entry.chunk.content.trim(), excerpt_chars);
        citations.insert(
            reference,
            Citation {
                reference,
                chunk_index: entry.chunk.index,
                page_number: entry.chunk.page_number,
                filename: entry.chunk.filename.clone(),
                excerpt_highlighted: highlight_snippet(&excerpt, &terms),
                excerpt,
                score: entry.score,
            },
        );
    }

    if !dropped.is_empty() {
        tracing::debug!(
            dropped = ?dropped,
            context_size = context.len(),
            "Dropped references with no matching context entry"
        );
    }

    (citations, dropped)
}

/// Escape text for an HTML body or quoted attribute
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Escape the answer as HTML and wrap each `[n]` marker in a clickable span
pub fn link_references(answer: &str) -> String {
    // escaping never creates or breaks a `[n]` marker
    reference_pattern()
        .replace_all(&escape_html(answer), "<span class='citation-ref'>[${1}]</span>")
        .into_owned()
}

/// Question words worth highlighting, stripped of punctuation
fn query_terms(question: &str) -> Vec<&str> {
    question
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Highlight query terms in citation snippets
///
/// The result is HTML: snippet text is escaped, matches are wrapped in `<mark>`.
pub fn highlight_snippet(snippet: &str, query_terms: &[&str]) -> String {
    let mut terms: Vec<&str> = query_terms
        .iter()
        .copied()
        .filter(|t| t.chars().count() >= 3) // skip very short terms
        .collect();
    if terms.is_empty() {
        return escape_html(snippet);
    }

    // longest first so overlapping terms prefer the fuller match
    terms.sort_by_key(|t| std::cmp::Reverse(t.len()));
    terms.dedup();

    let alternation = terms
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");

    let Ok(re) = RegexBuilder::new(&alternation).case_insensitive(true).build() else {
        return escape_html(snippet);
    };

    // match on the raw text so terms never land inside an entity
    let mut highlighted = String::with_capacity(snippet.len());
    let mut last = 0;
    for m in re.find_iter(snippet) {
        highlighted.push_str(&escape_html(&snippet[last..m.start()]));
        highlighted.push_str("<mark>");
        highlighted.push_str(&escape_html(m.as_str()));
        highlighted.push_str("</mark>");
        last = m.end();
    }
    highlighted.push_str(&escape_html(&snippet[last..]));
    highlighted
}

/// Truncate snippet to at most `max_chars` characters, preferring a word boundary
pub fn truncate_snippet(snippet: &str, max_chars: usize) -> String {
    let end = match snippet.char_indices().nth(max_chars) {
        Some((idx, _)) => idx,
        None => return snippet.to_string(),
    };

    if let Some(pos) = snippet[..end].rfind(' ').filter(|&p| p > 0) {
        return format!("{}...", &snippet[..pos]);
    }

    format!("{}...", &snippet[..end])
}
