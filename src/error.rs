//! Error types for every layer of the pipeline.
//! `TranslateError` is what callers of the engine see; the others stay
//! inside their adapters and are folded into it (or into a log line).

use thiserror::Error;

/// Coarse classification an outer layer (HTTP, CLI) maps to a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller must change the input; retrying is pointless.
    UserInput,
    /// The oracle could not produce an answer; the caller may retry later.
    Upstream,
    /// Storage or runtime fault.
    Internal,
}

/// Failure of `TranslationEngine::get_translation`.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid output language: {0}")]
    InvalidTarget(i64),
    #[error("input text is not understandable: {0}")]
    UnprocessableInput(String),
    #[error("unsupported input language: {0}")]
    UnsupportedLanguage(String),
    #[error("failed to determine language and category")]
    OracleUnavailable,
    #[error("failed to translate text")]
    GenerationFailed,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TranslateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranslateError::InvalidInput(_)
            | TranslateError::InvalidTarget(_)
            | TranslateError::UnprocessableInput(_)
            | TranslateError::UnsupportedLanguage(_) => ErrorKind::UserInput,
            TranslateError::OracleUnavailable | TranslateError::GenerationFailed => {
                ErrorKind::Upstream
            }
            TranslateError::Store(_) => ErrorKind::Internal,
        }
    }
}

/// Transport-level oracle failure. A structured "no answer" is not an
/// error; oracle methods return `Ok(None)` for that.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("API error: {0}")]
    Api(String),
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("oracle timeout")]
    Timeout,
    #[error("malformed oracle answer: {0}")]
    Decode(String),
    #[error("oracle misconfigured: {0}")]
    Config(String),
}

/// Storage adapter failure. Driver-specific shapes never leave the adapter:
/// a unique-constraint hit is always reported as `UniqueViolation`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated on {table}")]
    UniqueViolation { table: &'static str },
    #[error("database error: {0}")]
    Database(#[source] rusqlite::Error),
    #[error("column encoding error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid language: {0}")]
    InvalidLanguage(String),
    #[error("storage task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}

/// Configuration load failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
