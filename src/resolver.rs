//! Language resolution: turns raw text plus a target language id into a
//! validated `LanguageContext` and a short/long classification.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::TranslateError;
use crate::language::LanguageRegistry;
use crate::model::LanguageContext;
use crate::oracle::{Category, Classification, TextOracle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub context: LanguageContext,
    pub category: Category,
    /// Word or phrase; governs synonym/example enrichment downstream.
    pub is_short_text: bool,
}

#[derive(Clone)]
pub struct LanguageResolver {
    registry: Arc<dyn LanguageRegistry>,
    oracle: Arc<dyn TextOracle>,
}

impl LanguageResolver {
    pub fn new(registry: Arc<dyn LanguageRegistry>, oracle: Arc<dyn TextOracle>) -> Self {
        Self { registry, oracle }
    }

    /// Look up the target language and classify `text` concurrently, then
    /// map the detected language name onto a registry row.
    /// Pure read: no side effects.
    pub async fn resolve(
        &self,
        text: &str,
        output_language_id: i64,
    ) -> Result<Resolution, TranslateError> {
        let (target, classification) = tokio::join!(
            self.registry.find_by_id(output_language_id),
            self.oracle.classify(text),
        );

        let target = target?.ok_or(TranslateError::InvalidTarget(output_language_id))?;

        let (detected_name, category) = match classification {
            Ok(Some(Classification::Detected { language, category })) => (language, category),
            Ok(Some(Classification::Rejected { message })) => {
                debug!(%message, "oracle rejected input");
                return Err(TranslateError::UnprocessableInput(message));
            }
            Ok(None) => {
                warn!("language classification returned no answer");
                return Err(TranslateError::OracleUnavailable);
            }
            Err(e) => {
                warn!(error = %e, "language classification failed");
                return Err(TranslateError::OracleUnavailable);
            }
        };

        let source = self
            .registry
            .find_by_name(&detected_name)
            .await?
            .ok_or_else(|| TranslateError::UnsupportedLanguage(detected_name.clone()))?;

        debug!(
            source = %source.name,
            target = %target.name,
            %category,
            "language context resolved"
        );

        Ok(Resolution {
            context: LanguageContext {
                source_language_id: source.id,
                source_language_name: source.name,
                target_language_id: target.id,
                target_language_name: target.name,
            },
            category,
            is_short_text: category.is_short(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seeded_store, FakeOracle, Reply};
    use std::sync::atomic::Ordering;

    async fn resolver_with(oracle: FakeOracle) -> (tempfile::TempDir, LanguageResolver) {
        let (dir, store) = seeded_store().await;
        (dir, LanguageResolver::new(Arc::new(store), Arc::new(oracle)))
    }

    #[tokio::test]
    async fn resolves_word_as_short_text() {
        let (_dir, resolver) = resolver_with(FakeOracle::detecting("english", Category::Word)).await;
        let resolution = resolver.resolve("Eat", 2).await.unwrap();
        assert!(resolution.is_short_text);
        assert_eq!(resolution.category, Category::Word);
        assert_eq!(resolution.context.source_language_id, 1);
        // Canonical registry spelling, not the oracle's.
        assert_eq!(resolution.context.source_language_name, "English");
        assert_eq!(resolution.context.target_language_name, "Spanish");
    }

    #[tokio::test]
    async fn sentences_are_long_text() {
        let (_dir, resolver) =
            resolver_with(FakeOracle::detecting("English", Category::Sentence)).await;
        let resolution = resolver.resolve("I eat apples.", 2).await.unwrap();
        assert!(!resolution.is_short_text);
    }

    #[tokio::test]
    async fn unknown_target_is_invalid() {
        let oracle = Arc::new(FakeOracle::detecting("English", Category::Word));
        let (_dir, store) = seeded_store().await;
        let resolver = LanguageResolver::new(Arc::new(store), oracle.clone());

        let err = resolver.resolve("Eat", 999).await.unwrap_err();
        assert!(matches!(err, TranslateError::InvalidTarget(999)));
        assert_eq!(oracle.translate_count(), 0);
        // Classification runs concurrently with the registry lookup.
        assert_eq!(oracle.classify_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_input_is_unprocessable() {
        let mut oracle = FakeOracle::detecting("English", Category::Word);
        oracle.classification = Reply::Answer(Classification::Rejected {
            message: "Invalid input".into(),
        });
        let (_dir, resolver) = resolver_with(oracle).await;
        let err = resolver.resolve("asdfghjkl", 2).await.unwrap_err();
        assert!(matches!(err, TranslateError::UnprocessableInput(m) if m == "Invalid input"));
    }

    #[tokio::test]
    async fn silent_or_failing_oracle_is_unavailable() {
        for reply in [Reply::NoAnswer, Reply::Fail] {
            let mut oracle = FakeOracle::detecting("English", Category::Word);
            oracle.classification = reply;
            let (_dir, resolver) = resolver_with(oracle).await;
            let err = resolver.resolve("Eat", 2).await.unwrap_err();
            assert!(matches!(err, TranslateError::OracleUnavailable));
        }
    }

    #[tokio::test]
    async fn unknown_detected_language_is_unsupported() {
        let (_dir, resolver) = resolver_with(FakeOracle::detecting("Klingon", Category::Word)).await;
        let err = resolver.resolve("Qapla'", 2).await.unwrap_err();
        assert!(matches!(err, TranslateError::UnsupportedLanguage(name) if name == "Klingon"));
    }

    #[tokio::test]
    async fn invalid_target_wins_over_oracle_failure() {
        let mut oracle = FakeOracle::detecting("English", Category::Word);
        oracle.classification = Reply::Fail;
        let (_dir, resolver) = resolver_with(oracle).await;
        let err = resolver.resolve("Eat", 999).await.unwrap_err();
        assert!(matches!(err, TranslateError::InvalidTarget(999)));
    }
}
