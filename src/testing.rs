//! Fakes and fixtures shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::cache::sqlite::SqliteStore;
use crate::cache::{CacheEntry, CacheStore, PersistOutcome};
use crate::error::{OracleError, StoreError};
use crate::language::default_languages;
use crate::model::{CacheData, ExampleSentenceLink, LanguageContext, SynonymSet, TranslationPair};
use crate::oracle::{Category, Classification, DraftTranslation, ExampleSentence, TextOracle};

/// Fresh database with the default languages (English = 1, Spanish = 2, French = 3, ...).
pub(crate) async fn seeded_store() -> (tempfile::TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("cache.db")).unwrap();
    store.seed_languages(default_languages()).await.unwrap();
    (dir, store)
}

pub(crate) fn context_en_es() -> LanguageContext {
    LanguageContext {
        source_language_id: 1,
        source_language_name: "English".into(),
        target_language_id: 2,
        target_language_name: "Spanish".into(),
    }
}

pub(crate) fn sample_examples() -> Vec<ExampleSentence> {
    [
        ("I eat breakfast at seven.", "Desayuno a las siete."),
        ("We eat together on Sundays.", "Comemos juntos los domingos."),
        ("Cats eat fish.", "Los gatos comen pescado."),
    ]
    .into_iter()
    .map(|(s, t)| ExampleSentence {
        sentence: s.into(),
        translation: t.into(),
    })
    .collect()
}

pub(crate) fn sample_data() -> CacheData {
    CacheData {
        input_synonyms: vec!["dine".into(), "consume".into()],
        translation_synonyms: vec!["alimentarse".into(), "ingerir".into()],
        example_sentences: sample_examples(),
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Reply<T> {
    Answer(T),
    NoAnswer,
    Fail,
}

impl<T: Clone> Reply<T> {
    fn get(&self) -> Result<Option<T>, OracleError> {
        match self {
            Reply::Answer(v) => Ok(Some(v.clone())),
            Reply::NoAnswer => Ok(None),
            Reply::Fail => Err(OracleError::Api("fake transport failure".into())),
        }
    }
}

/// Scripted oracle that counts calls per capability.
pub(crate) struct FakeOracle {
    pub classification: Reply<Classification>,
    pub translation: Reply<DraftTranslation>,
    pub synonyms: Reply<Vec<String>>,
    pub examples: Reply<Vec<ExampleSentence>>,
    pub classify_calls: AtomicUsize,
    pub translate_calls: AtomicUsize,
    pub synonym_calls: AtomicUsize,
    pub example_calls: AtomicUsize,
    pub wanted_synonyms: AtomicBool,
}

impl FakeOracle {
    /// Detects `language`/`category` and answers every other capability.
    pub fn detecting(language: &str, category: Category) -> Self {
        Self {
            classification: Reply::Answer(Classification::Detected {
                language: language.into(),
                category,
            }),
            translation: Reply::Answer(DraftTranslation {
                translation: "Comer".into(),
                synonyms: sample_data().translation_synonyms,
            }),
            synonyms: Reply::Answer(sample_data().input_synonyms),
            examples: Reply::Answer(sample_examples()),
            classify_calls: AtomicUsize::new(0),
            translate_calls: AtomicUsize::new(0),
            synonym_calls: AtomicUsize::new(0),
            example_calls: AtomicUsize::new(0),
            wanted_synonyms: AtomicBool::new(false),
        }
    }

    pub fn translate_count(&self) -> usize {
        self.translate_calls.load(Ordering::SeqCst)
    }

    pub fn enrichment_count(&self) -> usize {
        self.synonym_calls.load(Ordering::SeqCst) + self.example_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextOracle for FakeOracle {
    async fn classify(&self, _text: &str) -> Result<Option<Classification>, OracleError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        self.classification.get()
    }

    async fn translate_and_synonymize(
        &self,
        _text: &str,
        want_synonyms: bool,
        _source_language: &str,
        _target_language: &str,
    ) -> Result<Option<DraftTranslation>, OracleError> {
        self.translate_calls.fetch_add(1, Ordering::SeqCst);
        self.wanted_synonyms.store(want_synonyms, Ordering::SeqCst);
        let mut draft = self.translation.get()?;
        if !want_synonyms {
            if let Some(d) = draft.as_mut() {
                d.synonyms.clear();
            }
        }
        Ok(draft)
    }

    async fn synonymize(
        &self,
        _text: &str,
        _language: &str,
    ) -> Result<Option<Vec<String>>, OracleError> {
        self.synonym_calls.fetch_add(1, Ordering::SeqCst);
        self.synonyms.get()
    }

    async fn example_sentences(
        &self,
        _text: &str,
        _source_language: &str,
        _target_language: &str,
    ) -> Result<Option<Vec<ExampleSentence>>, OracleError> {
        self.example_calls.fetch_add(1, Ordering::SeqCst);
        self.examples.get()
    }
}

/// Store whose reads always miss and whose writes always fail.
pub(crate) struct BrokenStore {
    pub persist_calls: AtomicUsize,
}

impl BrokenStore {
    pub fn new() -> Self {
        Self {
            persist_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CacheStore for BrokenStore {
    async fn find_translation(
        &self,
        _text: &str,
        _input_language_id: i64,
        _output_language_id: i64,
    ) -> Result<Option<TranslationPair>, StoreError> {
        Ok(None)
    }

    async fn find_synonyms(
        &self,
        _text: &str,
        _language_id: i64,
    ) -> Result<Option<SynonymSet>, StoreError> {
        Ok(None)
    }

    async fn find_example_link(
        &self,
        _text: &str,
        _language_id: i64,
        _output_language_id: i64,
    ) -> Result<Option<ExampleSentenceLink>, StoreError> {
        Ok(None)
    }

    async fn find_translations_by_ids(
        &self,
        _ids: &[i64],
    ) -> Result<Vec<TranslationPair>, StoreError> {
        Ok(Vec::new())
    }

    async fn persist(&self, _entry: &CacheEntry) -> Result<PersistOutcome, StoreError> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Task("disk on fire".into()))
    }
}
