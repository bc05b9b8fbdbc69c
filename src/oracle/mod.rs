//! Text oracle: the external LLM used for classification, translation,
//! synonyms and example sentences.
//!
//! Every capability returns `Ok(None)` when the oracle produced no usable
//! answer after its own retry budget, and `Err` for transport failures.

pub mod openai;
pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;

/// Linguistic category of an input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Word,
    Phrase,
    Sentence,
    Paragraph,
}

impl Category {
    /// Words and phrases get synonym and example-sentence enrichment.
    pub fn is_short(self) -> bool {
        matches!(self, Category::Word | Category::Phrase)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Word => write!(f, "Word"),
            Category::Phrase => write!(f, "Phrase"),
            Category::Sentence => write!(f, "Sentence"),
            Category::Paragraph => write!(f, "Paragraph"),
        }
    }
}

/// Outcome of `classify`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Detected { language: String, category: Category },
    /// The oracle judged the text not understandable.
    Rejected { message: String },
}

/// Output of `translate_and_synonymize`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DraftTranslation {
    pub translation: String,
    /// Synonyms of the translation; empty when not requested.
    #[serde(default)]
    pub synonyms: Vec<String>,
}

/// An example sentence in the source language with its translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleSentence {
    pub sentence: String,
    pub translation: String,
}

#[async_trait]
pub trait TextOracle: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Option<Classification>, OracleError>;

    async fn translate_and_synonymize(
        &self,
        text: &str,
        want_synonyms: bool,
        source_language: &str,
        target_language: &str,
    ) -> Result<Option<DraftTranslation>, OracleError>;

    async fn synonymize(
        &self,
        text: &str,
        language: &str,
    ) -> Result<Option<Vec<String>>, OracleError>;

    async fn example_sentences(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<Option<Vec<ExampleSentence>>, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_words_and_phrases_are_short() {
        assert!(Category::Word.is_short());
        assert!(Category::Phrase.is_short());
        assert!(!Category::Sentence.is_short());
        assert!(!Category::Paragraph.is_short());
    }
}
