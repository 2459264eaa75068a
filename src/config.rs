use crate::defaults;
use crate::error::{Result, SightError};
use crate::languages::{Language, LanguageCatalog, builtin_languages};
use crate::pipeline::OrchestratorConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineSettings,
    pub captioning: CaptioningConfig,
    pub translation: TranslationConfig,
    pub speech: SpeechConfig,
    pub languages: Vec<Language>,
}

/// Session timing and language selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub capture_interval_ms: u64,
    /// Language the captioner writes in
    pub default_language: String,
    /// Language selected when a session starts
    pub language: String,
    pub caption_timeout_ms: u64,
    pub translation_timeout_ms: u64,
    pub speech_timeout_ms: u64,
    /// Replay period of a directory camera
    pub frame_period_ms: u64,
}

/// Image captioning service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptioningConfig {
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Translation service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslationConfig {
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Speech synthesis service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    pub endpoint: String,
    /// Value of the `client=` query parameter sent to the TTS endpoint
    pub client: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineSettings::default(),
            captioning: CaptioningConfig::default(),
            translation: TranslationConfig::default(),
            speech: SpeechConfig::default(),
            languages: builtin_languages(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            capture_interval_ms: defaults::CAPTURE_INTERVAL_MS,
            default_language: defaults::DEFAULT_LANGUAGE.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            caption_timeout_ms: defaults::CAPTION_TIMEOUT_MS,
            translation_timeout_ms: defaults::TRANSLATION_TIMEOUT_MS,
            speech_timeout_ms: defaults::SPEECH_TIMEOUT_MS,
            frame_period_ms: defaults::FRAME_PERIOD_MS,
        }
    }
}

impl Default for CaptioningConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::CAPTION_ENDPOINT.to_string(),
            api_key: None,
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::TRANSLATION_ENDPOINT.to_string(),
            api_key: None,
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::SPEECH_ENDPOINT.to_string(),
            client: defaults::SPEECH_CLIENT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SightError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                SightError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(SightError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SIGHTSPEAK_LANGUAGE → pipeline.language
    /// - SIGHTSPEAK_CAPTION_API_KEY (or HF_API_KEY) → captioning.api_key
    /// - SIGHTSPEAK_CAPTION_ENDPOINT → captioning.endpoint
    /// - SIGHTSPEAK_TRANSLATE_API_KEY → translation.api_key
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(language) = non_empty_env("SIGHTSPEAK_LANGUAGE") {
            self.pipeline.language = language;
        }

        if let Some(key) =
            non_empty_env("SIGHTSPEAK_CAPTION_API_KEY").or_else(|| non_empty_env("HF_API_KEY"))
        {
            self.captioning.api_key = Some(key);
        }

        if let Some(endpoint) = non_empty_env("SIGHTSPEAK_CAPTION_ENDPOINT") {
            self.captioning.endpoint = endpoint;
        }

        if let Some(key) = non_empty_env("SIGHTSPEAK_TRANSLATE_API_KEY") {
            self.translation.api_key = Some(key);
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/sightspeak/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sightspeak")
            .join("config.toml")
    }

    /// Check values that deserialize fine but cannot run.
    pub fn validate(&self) -> Result<()> {
        let catalog = self.catalog()?;
        if catalog.get(&self.pipeline.language).is_none() {
            return Err(invalid(
                "pipeline.language",
                format!("'{}' is not in the language list", self.pipeline.language),
            ));
        }

        let mut codes: Vec<&str> = self.languages.iter().map(|l| l.code.as_str()).collect();
        codes.sort_unstable();
        if let Some(pair) = codes.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(invalid(
                "languages",
                format!("'{}' is listed more than once", pair[0]),
            ));
        }

        for (key, value) in [
            ("pipeline.caption_timeout_ms", self.pipeline.caption_timeout_ms),
            (
                "pipeline.translation_timeout_ms",
                self.pipeline.translation_timeout_ms,
            ),
            ("pipeline.speech_timeout_ms", self.pipeline.speech_timeout_ms),
            ("pipeline.frame_period_ms", self.pipeline.frame_period_ms),
        ] {
            if value == 0 {
                return Err(invalid(key, "must be greater than zero".to_string()));
            }
        }

        for (key, value) in [
            ("captioning.endpoint", &self.captioning.endpoint),
            ("translation.endpoint", &self.translation.endpoint),
            ("speech.endpoint", &self.speech.endpoint),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(key, "must not be empty".to_string()));
            }
        }

        Ok(())
    }

    /// Languages a session may select.
    pub fn catalog(&self) -> Result<LanguageCatalog> {
        LanguageCatalog::new(self.languages.clone(), &self.pipeline.default_language)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            default_language: self.pipeline.default_language.clone(),
            caption_timeout: Duration::from_millis(self.pipeline.caption_timeout_ms),
            translation_timeout: Duration::from_millis(self.pipeline.translation_timeout_ms),
            speech_timeout: Duration::from_millis(self.pipeline.speech_timeout_ms),
        }
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.pipeline.capture_interval_ms)
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(self.pipeline.frame_period_ms)
    }

    /// Copy with API keys masked, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        let mask = |key: &mut Option<String>| {
            if key.is_some() {
                *key = Some("********".to_string());
            }
        };
        mask(&mut config.captioning.api_key);
        mask(&mut config.translation.api_key);
        config
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn invalid(key: &str, message: String) -> SightError {
    SightError::ConfigInvalidValue {
        key: key.to_string(),
        message,
    }
}
