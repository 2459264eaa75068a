use crate::error::{Result, SightError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Trait for caption translation.
///
/// This trait allows swapping implementations (translation server vs mock).
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `target_language` (ISO 639-1 code).
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;
}

/// Interprets a LibreTranslate-style response body.
pub fn parse_translation_response(status: u16, body: &str) -> Result<String> {
    let value: Option<serde_json::Value> = serde_json::from_str(body).ok();

    if let Some(message) = value
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(|e| e.as_str())
    {
        return Err(SightError::Translation {
            message: message.to_string(),
        });
    }

    if !(200..300).contains(&status) {
        return Err(SightError::Translation {
            message: format!("HTTP {status}"),
        });
    }

    value
        .as_ref()
        .and_then(|v| v.get("translatedText"))
        .and_then(|t| t.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SightError::Translation {
            message: "response has no translatedText".to_string(),
        })
}

/// Translator backed by a LibreTranslate-compatible server.
#[cfg(feature = "http")]
pub struct HttpTranslator {
    client: reqwest::Client,
    url: String,
    source_language: String,
    api_key: Option<String>,
}

#[cfg(feature = "http")]
impl HttpTranslator {
    /// # Arguments
    /// * `endpoint` - Server base URL (`/translate` is appended)
    /// * `source_language` - Language captions are written in
    /// * `api_key` - Optional server API key
    /// * `timeout` - Per-request timeout
    pub fn new(
        endpoint: &str,
        source_language: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SightError::Translation {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            url: format!("{}/translate", endpoint.trim_end_matches('/')),
            source_language: source_language.to_string(),
            api_key,
        })
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        let mut payload = serde_json::json!({
            "q": text,
            "source": self.source_language,
            "target": target_language,
            "format": "text",
        });
        if let Some(key) = &self.api_key {
            payload["api_key"] = serde_json::Value::String(key.clone());
        }
        let body = serde_json::to_vec(&payload).map_err(|e| SightError::Translation {
            message: format!("failed to encode request: {e}"),
        })?;

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| SightError::Translation {
                message: format!("request failed: {e}"),
            })?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| SightError::Translation {
            message: format!("failed to read response: {e}"),
        })?;

        parse_translation_response(status, &text)
    }
}

/// Mock translator for testing.
///
/// Returns a configured translation per language, or `"[lang] text"` when
/// none is configured. Deterministic for a given input.
#[derive(Debug, Clone)]
pub struct MockTranslator {
    translations: HashMap<String, String>,
    should_fail: bool,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self {
            translations: HashMap::new(),
            should_fail: false,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Configure the text returned for `language`
    pub fn with_translation(mut self, language: &str, text: &str) -> Self {
        self.translations
            .insert(language.to_string(), text.to_string());
        self
    }

    /// Configure the mock to fail on translate
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Configure the mock to take `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of translate calls made so far (shared between clones)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.should_fail {
            return Err(SightError::Translation {
                message: "mock translation failure".to_string(),
            });
        }
        Ok(self
            .translations
            .get(target_language)
            .cloned()
            .unwrap_or_else(|| format!("[{target_language}] {text}")))
    }
}
