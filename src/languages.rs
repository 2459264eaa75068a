//! Closed set of languages a session can speak.
//!
//! The catalog is configuration, not pipeline logic: adding a code means
//! adding a `[[languages]]` entry, nothing else.

use crate::defaults;
use crate::error::{Result, SightError};
use serde::{Deserialize, Serialize};

/// One selectable language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// ISO 639-1 code sent to the translator and the speech service.
    pub code: String,
    /// Human-readable name shown to the user.
    pub name: String,
}

impl Language {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
        }
    }
}

/// Languages available to a session, plus the one captions arrive in.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageCatalog {
    languages: Vec<Language>,
    default_code: String,
}

impl LanguageCatalog {
    /// Builds a catalog. The default language must be one of `languages`.
    pub fn new(languages: Vec<Language>, default_code: &str) -> Result<Self> {
        if !languages.iter().any(|l| l.code == default_code) {
            return Err(SightError::ConfigInvalidValue {
                key: "pipeline.default_language".to_string(),
                message: format!("'{default_code}' is not in the language list"),
            });
        }
        Ok(Self {
            languages,
            default_code: default_code.to_string(),
        })
    }

    /// The code captions are produced in.
    pub fn default_code(&self) -> &str {
        &self.default_code
    }

    pub fn is_default(&self, code: &str) -> bool {
        self.default_code == code
    }

    pub fn get(&self, code: &str) -> Option<&Language> {
        self.languages.iter().find(|l| l.code == code)
    }

    /// Returns the language for `code`, or `UnsupportedLanguage`.
    pub fn resolve(&self, code: &str) -> Result<&Language> {
        self.get(code).ok_or_else(|| SightError::UnsupportedLanguage {
            code: code.to_string(),
        })
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }
}

impl Default for LanguageCatalog {
    fn default() -> Self {
        Self {
            languages: builtin_languages(),
            default_code: defaults::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// The built-in language table as owned entries.
pub fn builtin_languages() -> Vec<Language> {
    defaults::LANGUAGES
        .iter()
        .map(|(code, name)| Language::new(code, name))
        .collect()
}
