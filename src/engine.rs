//! Translation engine: the single `get_translation` entry point.
//!
//! resolve → identity check → cache lookup → generate → respond → queue persist.
//! Generation fans out the translation, input-synonym and example calls
//! concurrently; only the translation is mandatory.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::cache::writer::{CacheWriter, PersistJob};
use crate::cache::TranslationCache;
use crate::error::{OracleError, TranslateError};
use crate::metrics::{metric_names, MetricSummary, MetricsRegistry, RequestIds};
use crate::model::{CacheData, TranslationResult};
use crate::oracle::{DraftTranslation, ExampleSentence, TextOracle};
use crate::phase::{PhaseTracker, RequestPhase};
use crate::resolver::{LanguageResolver, Resolution};

pub struct TranslationEngine {
    resolver: LanguageResolver,
    cache: TranslationCache,
    oracle: Arc<dyn TextOracle>,
    writer: CacheWriter,
    metrics: Arc<MetricsRegistry>,
    max_input_chars: usize,
}

impl TranslationEngine {
    /// Must be called inside a Tokio runtime; starts the background cache writer.
    pub fn new(
        resolver: LanguageResolver,
        cache: TranslationCache,
        oracle: Arc<dyn TextOracle>,
        metrics: Arc<MetricsRegistry>,
        max_input_chars: usize,
    ) -> Self {
        let writer = CacheWriter::spawn(cache.clone(), Arc::clone(&metrics));
        Self {
            resolver,
            cache,
            oracle,
            writer,
            metrics,
            max_input_chars,
        }
    }

    pub async fn get_translation(
        &self,
        text: &str,
        output_language_id: i64,
    ) -> Result<TranslationResult, TranslateError> {
        let ids = RequestIds::new();
        let span = info_span!(
            "get_translation",
            request_id = %ids.request_id,
            output_language_id
        );
        self.run(ids.request_id, text, output_language_id)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        request_id: String,
        text: &str,
        output_language_id: i64,
    ) -> Result<TranslationResult, TranslateError> {
        self.validate_input(text)?;
        let mut phase = PhaseTracker::new(request_id.clone());

        let resolve_span = self.metrics.span(metric_names::RESOLVE);
        let resolution = self.resolver.resolve(text, output_language_id).await?;
        resolve_span.finish();

        let Resolution {
            context,
            category,
            is_short_text,
        } = resolution;

        if context.is_identity() {
            let respond = self.metrics.span(metric_names::RESPOND_IDENTITY);
            phase.advance(RequestPhase::IdentityShortCircuit);
            phase.advance(RequestPhase::Responded);
            respond.finish();
            info!(source = %context.source_language_name, "identity translation");
            return Ok(TranslationResult::plain(
                context.source_language_name,
                text,
            ));
        }

        let lookup_span = self.metrics.span(metric_names::CACHE_LOOKUP);
        let cached = match self.cache.lookup(text, &context, is_short_text).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, "cache lookup failed, treating as miss");
                None
            }
        };
        lookup_span.finish();

        if let Some(result) = cached {
            let respond = self.metrics.span(metric_names::RESPOND_CACHE_HIT);
            phase.advance(RequestPhase::CacheHit);
            phase.advance(RequestPhase::Responded);
            respond.finish();
            info!(%category, "cache hit");
            return Ok(result);
        }

        phase.advance(RequestPhase::Generating);
        let generate_span = self.metrics.span(metric_names::GENERATE);
        let respond = self.metrics.span(metric_names::RESPOND_GENERATED);

        let source = context.source_language_name.as_str();
        let target = context.target_language_name.as_str();
        let (draft, input_synonyms, examples) = tokio::join!(
            self.oracle
                .translate_and_synonymize(text, is_short_text, source, target),
            self.input_synonyms(text, source, is_short_text),
            self.example_sentences(text, source, target, is_short_text),
        );
        generate_span.finish();

        let draft = match draft {
            Ok(Some(draft)) => draft,
            Ok(None) => {
                warn!("oracle returned no translation");
                return Err(TranslateError::GenerationFailed);
            }
            Err(e) => {
                warn!(error = %e, "translation call failed");
                return Err(TranslateError::GenerationFailed);
            }
        };
        let DraftTranslation {
            translation,
            synonyms: translation_synonyms,
        } = draft;

        let result = if is_short_text {
            TranslationResult {
                source_language_name: context.source_language_name.clone(),
                translation: translation.clone(),
                input_synonyms: Some(input_synonyms.clone()),
                translation_synonyms: Some(translation_synonyms.clone()),
                example_sentences: Some(examples.clone()),
            }
        } else {
            TranslationResult::plain(context.source_language_name.clone(), translation.clone())
        };
        phase.advance(RequestPhase::Responded);
        respond.finish();

        let data = CacheData {
            input_synonyms,
            translation_synonyms,
            example_sentences: examples,
        };
        if is_short_text && data.is_complete() {
            phase.advance(RequestPhase::CachePersisting);
            self.writer.submit(PersistJob {
                request_id,
                text: text.to_string(),
                translation,
                context,
                data,
            });
        } else {
            debug!(is_short_text, "result not cacheable");
        }

        info!(%category, "generated translation");
        Ok(result)
    }

    fn validate_input(&self, text: &str) -> Result<(), TranslateError> {
        if text.trim().is_empty() {
            return Err(TranslateError::InvalidInput("text must not be empty".into()));
        }
        let chars = text.chars().count();
        if chars > self.max_input_chars {
            return Err(TranslateError::InvalidInput(format!(
                "text is {chars} characters, limit is {}",
                self.max_input_chars
            )));
        }
        Ok(())
    }

    async fn input_synonyms(&self, text: &str, language: &str, wanted: bool) -> Vec<String> {
        if !wanted {
            return Vec::new();
        }
        degrade("synonyms", self.oracle.synonymize(text, language).await)
    }

    async fn example_sentences(
        &self,
        text: &str,
        source: &str,
        target: &str,
        wanted: bool,
    ) -> Vec<ExampleSentence> {
        if !wanted {
            return Vec::new();
        }
        degrade(
            "example sentences",
            self.oracle.example_sentences(text, source, target).await,
        )
    }

    pub fn metrics_summary(&self) -> HashMap<String, MetricSummary> {
        self.metrics.summary()
    }

    /// Wait for queued cache writes.
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    pub async fn shutdown(&self) {
        self.writer.shutdown().await;
    }
}

/// Optional enrichment: no answer or a failed call is an empty list.
fn degrade<T>(what: &str, result: Result<Option<Vec<T>>, OracleError>) -> Vec<T> {
    match result {
        Ok(Some(items)) => items,
        Ok(None) => {
            debug!(what, "no answer, using empty list");
            Vec::new()
        }
        Err(e) => {
            warn!(what, error = %e, "enrichment call failed, using empty list");
            Vec::new()
        }
    }
}
