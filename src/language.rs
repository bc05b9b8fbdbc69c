//! Language reference data and the read-only registry over it.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A known language. Seeded once, never mutated by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: i64,
    /// Capitalized display name, e.g. "English".
    pub name: String,
    /// Two-letter lowercase code, e.g. "en".
    pub code: String,
}

/// A language row before it has an id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewLanguage {
    pub name: String,
    pub code: String,
}

impl NewLanguage {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }

    /// Check the name/code shape constraints of the `language` table.
    pub fn validate(&self) -> Result<(), StoreError> {
        if !name_pattern().is_match(&self.name) {
            return Err(StoreError::InvalidLanguage(format!(
                "name {:?} must be a single capitalized word",
                self.name
            )));
        }
        if !code_pattern().is_match(&self.code) {
            return Err(StoreError::InvalidLanguage(format!(
                "code {:?} must be two lowercase letters",
                self.code
            )));
        }
        Ok(())
    }
}

fn name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z][a-z]+$").expect("static regex"))
}

fn code_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z]{2}$").expect("static regex"))
}

/// Reference languages installed by `wordbridge seed`.
pub fn default_languages() -> Vec<NewLanguage> {
    [
        ("English", "en"),
        ("Spanish", "es"),
        ("French", "fr"),
        ("German", "de"),
        ("Italian", "it"),
        ("Portuguese", "pt"),
        ("Japanese", "ja"),
        ("Korean", "ko"),
        ("Chinese", "zh"),
        ("Russian", "ru"),
    ]
    .into_iter()
    .map(|(name, code)| NewLanguage::new(name, code))
    .collect()
}

/// Read-only lookup of known languages.
#[async_trait]
pub trait LanguageRegistry: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Language>, StoreError>;

    /// Case-insensitive match on the display name.
    async fn find_by_name(&self, name: &str) -> Result<Option<Language>, StoreError>;

    /// All languages ordered by id.
    async fn list(&self) -> Result<Vec<Language>, StoreError>;

    /// All languages, or only the one with `id` when given.
    async fn get(&self, id: Option<i64>) -> Result<Vec<Language>, StoreError> {
        match id {
            Some(id) => Ok(self.find_by_id(id).await?.into_iter().collect()),
            None => self.list().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_languages() {
        for lang in default_languages() {
            lang.validate().unwrap();
        }
    }

    #[test]
    fn rejects_malformed_names_and_codes() {
        assert!(NewLanguage::new("english", "en").validate().is_err());
        assert!(NewLanguage::new("Old English", "ang").validate().is_err());
        assert!(NewLanguage::new("English", "EN").validate().is_err());
        assert!(NewLanguage::new("English", "eng").validate().is_err());
    }
}
