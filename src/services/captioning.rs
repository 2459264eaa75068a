use crate::error::{Result, SightError};
use crate::frame::ImageData;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Trait for image captioning.
///
/// This trait allows swapping implementations (hosted model vs mock).
#[async_trait]
pub trait Captioner: Send + Sync {
    /// Describe the image in natural language.
    async fn caption(&self, image: &ImageData) -> Result<String>;

    /// Name of the backing model or service.
    fn name(&self) -> &str;
}

/// Interprets a captioning response body.
///
/// The hosted inference API answers `[{"generated_text": "..."}]` on success
/// and `{"error": "...", "estimated_time": 20.0}` while the model is loading.
pub fn parse_caption_response(status: u16, body: &str) -> Result<String> {
    if status == 429 {
        return Err(SightError::Captioning {
            message: "rate limited by captioning service".to_string(),
        });
    }

    let value: Option<serde_json::Value> = serde_json::from_str(body).ok();

    if let Some(message) = value
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(|e| e.as_str())
    {
        let message = match value
            .as_ref()
            .and_then(|v| v.get("estimated_time"))
            .and_then(|t| t.as_f64())
        {
            Some(secs) => format!("{message} (ready in ~{}s)", secs.ceil() as u64),
            None => message.to_string(),
        };
        return Err(SightError::Captioning { message });
    }

    if !(200..300).contains(&status) {
        return Err(SightError::Captioning {
            message: format!("HTTP {status}"),
        });
    }

    let text = value
        .as_ref()
        .and_then(|v| v.as_array())
        .and_then(|items| items.first())
        .and_then(|item| item.get("generated_text"))
        .and_then(|t| t.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty());

    match text {
        Some(text) => Ok(text.to_string()),
        None => Err(SightError::Captioning {
            message: "unexpected response from the model".to_string(),
        }),
    }
}

/// Captioner backed by a hosted image-to-text model.
#[cfg(feature = "http")]
pub struct HttpCaptioner {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[cfg(feature = "http")]
impl HttpCaptioner {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SightError::Captioning {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key,
        })
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl Captioner for HttpCaptioner {
    async fn caption(&self, image: &ImageData) -> Result<String> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, image.content_type.as_str())
            .body(image.bytes.clone());
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| SightError::Captioning {
            message: format!("request failed: {e}"),
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| SightError::Captioning {
            message: format!("failed to read response: {e}"),
        })?;

        parse_caption_response(status, &body)
    }

    fn name(&self) -> &str {
        self.endpoint
            .rsplit("/models/")
            .next()
            .unwrap_or(&self.endpoint)
    }
}

/// Mock captioner for testing
#[derive(Debug, Clone)]
pub struct MockCaptioner {
    response: String,
    should_fail: bool,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl MockCaptioner {
    /// Create a new mock captioner with default settings
    pub fn new() -> Self {
        Self {
            response: "mock caption".to_string(),
            should_fail: false,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Configure the mock to return a specific caption
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail on caption
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Configure the mock to take `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of caption calls made so far (shared between clones)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockCaptioner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Captioner for MockCaptioner {
    async fn caption(&self, _image: &ImageData) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.should_fail {
            Err(SightError::Captioning {
                message: "mock captioning failure".to_string(),
            })
        } else {
            Ok(self.response.clone())
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
