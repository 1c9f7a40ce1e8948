//! Answer generation with numbered context and citation parsing

pub mod citation;
pub mod composer;
pub mod language;
pub mod prompt;

pub use citation::{build_citations, extract_reference_numbers, link_references};
pub use composer::{AnswerComposer, ComposedAnswer};
pub use language::AnswerLanguage;
pub use prompt::PromptBuilder;
