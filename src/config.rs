//! Process configuration.
//! Loaded from an optional JSON file; every field has a default so a missing
//! file (or a partial one) still yields a usable config.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ConfigError;

/// Override for `database_path`.
pub const ENV_DATABASE: &str = "WORDBRIDGE_DB";
/// Override for `oracle.model`.
pub const ENV_MODEL: &str = "WORDBRIDGE_MODEL";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    /// Longest accepted input, in characters.
    pub max_input_chars: usize,
    pub oracle: OracleConfig,
    pub log: LogConfig,
    /// Where this config came from. Filled by `load`, never read from the file.
    #[serde(skip)]
    pub source: ConfigSource,
}

/// Origin of a loaded `Config`. `load` runs before tracing is installed, so
/// the caller reports it through `log_source` afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    #[default]
    Defaults,
    File(PathBuf),
    MissingFile(PathBuf),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("wordbridge.db"),
            max_input_chars: 400,
            oracle: OracleConfig::default(),
            log: LogConfig::default(),
            source: ConfigSource::Defaults,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Budget for connect + time to first streamed content.
    pub timeout_ms: u64,
    /// Total attempts per call (2 = one retry).
    pub max_attempts: u32,
    /// Minimum spacing between outgoing requests. 0 disables pacing.
    pub min_interval_ms: u64,
    pub temperature: f32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            model: "gpt-4o-mini-2024-07-18".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            timeout_ms: 5000,
            max_attempts: 2,
            min_interval_ms: 0,
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Fallback filter when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "wordbridge=info".into(),
            json: false,
        }
    }
}

impl Config {
    /// Load from `path` (defaults when `None` or when the file does not exist),
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p)?;
                let mut parsed: Config = serde_json::from_str(&content)?;
                parsed.source = ConfigSource::File(p.to_path_buf());
                parsed
            }
            Some(p) => Config {
                source: ConfigSource::MissingFile(p.to_path_buf()),
                ..Config::default()
            },
            None => Config::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Log where the config came from. Call once tracing is up.
    pub fn log_source(&self) {
        match &self.source {
            ConfigSource::File(p) => info!(path = %p.display(), "config loaded"),
            ConfigSource::MissingFile(p) => {
                warn!(path = %p.display(), "config file not found, using defaults")
            }
            ConfigSource::Defaults => info!("no config file given, using defaults"),
        }
    }

    fn apply_env(&mut self) {
        if let Ok(db) = std::env::var(ENV_DATABASE) {
            if !db.is_empty() {
                self.database_path = PathBuf::from(db);
            }
        }
        if let Ok(model) = std::env::var(ENV_MODEL) {
            if !model.is_empty() {
                self.oracle.model = model;
            }
        }
    }
}
