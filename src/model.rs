//! Types shared by the resolver, cache and engine.

use serde::{Deserialize, Serialize};

use crate::oracle::ExampleSentence;

/// Source and target language of one request, both resolved to registry rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageContext {
    pub source_language_id: i64,
    pub source_language_name: String,
    pub target_language_id: i64,
    pub target_language_name: String,
}

impl LanguageContext {
    /// Source and target are the same language (names compared case-insensitively).
    pub fn is_identity(&self) -> bool {
        self.source_language_name.to_lowercase() == self.target_language_name.to_lowercase()
    }
}

/// Response of `get_translation`.
///
/// The enrichment fields are `Some` exactly when the input was a word or
/// phrase, even if they ended up empty; otherwise they are left out of the
/// serialized form entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub source_language_name: String,
    pub translation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_synonyms: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_synonyms: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_sentences: Option<Vec<ExampleSentence>>,
}

impl TranslationResult {
    /// A result without enrichment.
    pub fn plain(source_language_name: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            source_language_name: source_language_name.into(),
            translation: translation.into(),
            input_synonyms: None,
            translation_synonyms: None,
            example_sentences: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_enriched(&self) -> bool {
        self.input_synonyms.is_some()
            || self.translation_synonyms.is_some()
            || self.example_sentences.is_some()
    }
}

/// Generated enrichment handed to the cache after a short-text miss.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheData {
    pub input_synonyms: Vec<String>,
    pub translation_synonyms: Vec<String>,
    pub example_sentences: Vec<ExampleSentence>,
}

impl CacheData {
    /// Partial short-text results are never cached.
    pub fn is_complete(&self) -> bool {
        !self.input_synonyms.is_empty()
            && !self.translation_synonyms.is_empty()
            && !self.example_sentences.is_empty()
    }
}

/// Row of `translation`. The cache key is (input_text, input_language_id, output_language_id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationPair {
    pub id: i64,
    pub input_text: String,
    pub input_language_id: i64,
    pub output_text: String,
    pub output_language_id: i64,
    pub created_at: i64,
}

/// Row of `synonym`, keyed by (text, language_id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymSet {
    pub id: i64,
    pub text: String,
    pub synonyms: Vec<String>,
    pub language_id: i64,
}

/// Row of `example_sentence`, keyed by (text, language_id, output_language_id).
/// Example bodies live in `translation`; this row only holds their ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleSentenceLink {
    pub id: i64,
    pub text: String,
    pub translation_ids: Vec<i64>,
    pub language_id: i64,
    pub output_language_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(source: &str, target: &str) -> LanguageContext {
        LanguageContext {
            source_language_id: 1,
            source_language_name: source.into(),
            target_language_id: 2,
            target_language_name: target.into(),
        }
    }

    #[test]
    fn identity_ignores_case() {
        assert!(context("English", "english").is_identity());
        assert!(!context("English", "Spanish").is_identity());
    }

    #[test]
    fn plain_result_omits_enrichment_fields() {
        let json = serde_json::to_value(TranslationResult::plain("English", "Hola")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "sourceLanguageName": "English", "translation": "Hola" })
        );
    }

    #[test]
    fn enriched_result_keeps_empty_lists() {
        let result = TranslationResult {
            input_synonyms: Some(vec![]),
            translation_synonyms: Some(vec!["comer".into()]),
            example_sentences: Some(vec![]),
            ..TranslationResult::plain("English", "comer")
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["inputSynonyms"], serde_json::json!([]));
        assert_eq!(json["exampleSentences"], serde_json::json!([]));
        assert!(result.is_enriched());
    }

    #[test]
    fn cache_data_requires_all_three_parts() {
        let mut data = CacheData {
            input_synonyms: vec!["dine".into()],
            translation_synonyms: vec!["comer".into()],
            example_sentences: vec![ExampleSentence {
                sentence: "I eat".into(),
                translation: "Yo como".into(),
            }],
        };
        assert!(data.is_complete());
        data.translation_synonyms.clear();
        assert!(!data.is_complete());
    }
}
