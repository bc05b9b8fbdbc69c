//! Translation cache: translation pairs, synonym sets and example-sentence
//! links, read and written as one unit per request.
//!
//! `CacheStore` is the row-level storage seam; `TranslationCache` layers the
//! request-level rules on top (long text is never enriched, enrichment is
//! all-or-nothing, partial results are never written).

pub mod sqlite;
pub mod writer;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::StoreError;
use crate::model::{
    CacheData, ExampleSentenceLink, LanguageContext, SynonymSet, TranslationPair,
    TranslationResult,
};
use crate::oracle::ExampleSentence;

/// Everything one `persist` call writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub text: String,
    pub translation: String,
    pub source_language_id: i64,
    pub target_language_id: i64,
    pub data: CacheData,
}

/// Row counts of a `persist` call. A deduplicated row was already present
/// under the same key (another request wrote it first).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    pub inserted: usize,
    pub deduplicated: usize,
}

impl PersistOutcome {
    /// Count one insert, treating a unique violation as deduplication.
    pub fn record(&mut self, result: Result<(), StoreError>) -> Result<(), StoreError> {
        match result {
            Ok(()) => self.inserted += 1,
            Err(e) if e.is_unique_violation() => self.deduplicated += 1,
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

/// Row-level access to the three cache tables.
/// All text lookups are case-insensitive; stored text keeps its case.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn find_translation(
        &self,
        text: &str,
        input_language_id: i64,
        output_language_id: i64,
    ) -> Result<Option<TranslationPair>, StoreError>;

    async fn find_synonyms(
        &self,
        text: &str,
        language_id: i64,
    ) -> Result<Option<SynonymSet>, StoreError>;

    async fn find_example_link(
        &self,
        text: &str,
        language_id: i64,
        output_language_id: i64,
    ) -> Result<Option<ExampleSentenceLink>, StoreError>;

    /// Rows for the given ids; unknown ids are simply absent from the result.
    async fn find_translations_by_ids(
        &self,
        ids: &[i64],
    ) -> Result<Vec<TranslationPair>, StoreError>;

    /// Write all rows of `entry` in one transaction. Unique violations are
    /// absorbed per row; any other failure rolls the whole write back.
    async fn persist(&self, entry: &CacheEntry) -> Result<PersistOutcome, StoreError>;
}

#[derive(Clone)]
pub struct TranslationCache {
    store: Arc<dyn CacheStore>,
}

impl TranslationCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Cached result for `text` in `context`, or `None` on a miss.
    ///
    /// For short text a hit requires the translation pair, both synonym sets,
    /// the example link and every example row it references; anything less
    /// is a miss.
    pub async fn lookup(
        &self,
        text: &str,
        context: &LanguageContext,
        is_short_text: bool,
    ) -> Result<Option<TranslationResult>, StoreError> {
        let Some(pair) = self
            .store
            .find_translation(text, context.source_language_id, context.target_language_id)
            .await?
        else {
            return Ok(None);
        };

        let translation = pair.output_text;
        if !is_short_text {
            return Ok(Some(TranslationResult::plain(
                context.source_language_name.clone(),
                translation,
            )));
        }

        let (input_synonyms, translation_synonyms, link) = tokio::try_join!(
            self.store.find_synonyms(text, context.source_language_id),
            self.store
                .find_synonyms(&translation, context.target_language_id),
            self.store.find_example_link(
                text,
                context.source_language_id,
                context.target_language_id
            ),
        )?;

        let (Some(input_synonyms), Some(translation_synonyms), Some(link)) =
            (input_synonyms, translation_synonyms, link)
        else {
            debug!(text, "cached translation lacks enrichment, treating as miss");
            return Ok(None);
        };

        let Some(example_sentences) = self.materialize_examples(&link).await? else {
            debug!(
                text,
                link_id = link.id,
                "example link references missing rows, treating as miss"
            );
            return Ok(None);
        };

        Ok(Some(TranslationResult {
            source_language_name: context.source_language_name.clone(),
            translation,
            input_synonyms: Some(input_synonyms.synonyms),
            translation_synonyms: Some(translation_synonyms.synonyms),
            example_sentences: Some(example_sentences),
        }))
    }

    /// Resolve the link's ids in their stored order. `None` if any is gone.
    async fn materialize_examples(
        &self,
        link: &ExampleSentenceLink,
    ) -> Result<Option<Vec<ExampleSentence>>, StoreError> {
        let rows = self
            .store
            .find_translations_by_ids(&link.translation_ids)
            .await?;

        let mut examples = Vec::with_capacity(link.translation_ids.len());
        for id in &link.translation_ids {
            match rows.iter().find(|r| r.id == *id) {
                Some(row) => examples.push(ExampleSentence {
                    sentence: row.input_text.clone(),
                    translation: row.output_text.clone(),
                }),
                None => return Ok(None),
            }
        }
        Ok(Some(examples))
    }

    /// Store a generated short-text result. Incomplete data is not written.
    pub async fn persist(
        &self,
        text: &str,
        translation: &str,
        context: &LanguageContext,
        data: CacheData,
    ) -> Result<PersistOutcome, StoreError> {
        if !data.is_complete() {
            debug!(text, "incomplete enrichment, not caching");
            return Ok(PersistOutcome::default());
        }
        let entry = CacheEntry {
            text: text.to_string(),
            translation: translation.to_string(),
            source_language_id: context.source_language_id,
            target_language_id: context.target_language_id,
            data,
        };
        self.store.persist(&entry).await
    }
}
