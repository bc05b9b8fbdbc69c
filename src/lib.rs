//! wordbridge: cached word and sentence translation backed by a text oracle.
//! Library root: module declarations, tracing setup and component wiring.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod language;
pub mod metrics;
pub mod model;
pub mod oracle;
pub mod phase;
pub mod resolver;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

pub use cache::sqlite::SqliteStore;
pub use config::{Config, LogConfig};
pub use engine::TranslationEngine;
pub use error::{ErrorKind, TranslateError};
pub use model::TranslationResult;

use cache::TranslationCache;
use error::{OracleError, StoreError};
use metrics::MetricsRegistry;
use oracle::openai::OpenAiOracle;
use oracle::TextOracle;
use resolver::LanguageResolver;

/// Install the global tracing subscriber. `RUST_LOG` wins over `config.filter`.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("wordbridge=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Open the cache database named in `config`.
pub fn open_store(config: &Config) -> Result<SqliteStore, StoreError> {
    SqliteStore::open(&config.database_path)
}

/// Wire an engine around `store` and `oracle`. Spawns the cache writer, so it
/// must run inside a Tokio runtime.
pub fn build_engine_with(
    config: &Config,
    store: SqliteStore,
    oracle: Arc<dyn TextOracle>,
) -> TranslationEngine {
    let metrics = Arc::new(MetricsRegistry::new());
    let store = Arc::new(store);
    let resolver = LanguageResolver::new(store.clone(), Arc::clone(&oracle));
    let cache = TranslationCache::new(store);
    info!(
        max_input_chars = config.max_input_chars,
        "translation engine ready"
    );
    TranslationEngine::new(resolver, cache, oracle, metrics, config.max_input_chars)
}

/// Same as [`build_engine_with`] using the OpenAI-compatible oracle from
/// `config.oracle`. Fails when the API key variable is unset.
pub fn build_engine(config: &Config, store: SqliteStore) -> Result<TranslationEngine, OracleError> {
    let oracle = OpenAiOracle::new(&config.oracle)?;
    info!(model = %config.oracle.model, base_url = %config.oracle.base_url, "oracle client initialized");
    Ok(build_engine_with(config, store, Arc::new(oracle)))
}
