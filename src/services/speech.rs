use crate::defaults;
use crate::error::{Result, SightError};
use crate::pipeline::types::AudioClip;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for text-to-speech.
///
/// This trait allows swapping implementations (speech service vs mock).
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text` in `language` (ISO 639-1 code).
    async fn synthesize(&self, text: &str, language: &str) -> Result<AudioClip>;
}

/// Characters after which a new speech request starts.
const SENTENCE_ENDS: &[char] = &['.', '!', '?', '।', '॥'];

/// Splits text into pieces of at most `max_chars` characters.
///
/// Breaks after sentence punctuation first, then between words. A single
/// word longer than `max_chars` is cut by character. Lengths count chars,
/// not bytes, so Indic scripts are measured correctly.
pub fn split_for_speech(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            pieces.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
            continue;
        }

        if !current.is_empty() && current_len + 1 + word_len > max_chars {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;

        if word.ends_with(SENTENCE_ENDS) {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

/// Speech synthesizer backed by the Google Translate speech endpoint.
///
/// Long text is split into ≤100-character requests whose MP3 segments are
/// concatenated in order.
#[cfg(feature = "http")]
pub struct GoogleTtsSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
}

#[cfg(feature = "http")]
impl GoogleTtsSynthesizer {
    pub fn new(endpoint: &str, client_id: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SightError::Speech {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            client_id: client_id.to_string(),
        })
    }

    fn piece_url(&self, piece: &str, language: &str, idx: usize, total: usize) -> Result<reqwest::Url> {
        let idx = idx.to_string();
        let total = total.to_string();
        let textlen = piece.chars().count().to_string();
        reqwest::Url::parse_with_params(
            &self.endpoint,
            &[
                ("ie", "UTF-8"),
                ("q", piece),
                ("tl", language),
                ("client", self.client_id.as_str()),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("textlen", textlen.as_str()),
            ],
        )
        .map_err(|e| SightError::Speech {
            message: format!("invalid speech endpoint {}: {e}", self.endpoint),
        })
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl SpeechSynthesizer for GoogleTtsSynthesizer {
    async fn synthesize(&self, text: &str, language: &str) -> Result<AudioClip> {
        let pieces = split_for_speech(text, defaults::SPEECH_MAX_CHARS);
        if pieces.is_empty() {
            return Err(SightError::Speech {
                message: "nothing to speak".to_string(),
            });
        }

        let mut audio = Vec::new();
        for (idx, piece) in pieces.iter().enumerate() {
            let url = self.piece_url(piece, language, idx, pieces.len())?;
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| SightError::Speech {
                    message: format!("request failed: {e}"),
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(SightError::Speech {
                    message: format!("HTTP {} for language '{language}'", status.as_u16()),
                });
            }

            let bytes = response.bytes().await.map_err(|e| SightError::Speech {
                message: format!("failed to read audio: {e}"),
            })?;
            audio.extend_from_slice(&bytes);
        }

        Ok(AudioClip::new(audio, "audio/mpeg"))
    }
}

/// Mock synthesizer for testing.
///
/// Produces `"<lang>:<text>"` as the audio payload and records every request.
#[derive(Debug, Clone)]
pub struct MockSynthesizer {
    should_fail: bool,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self {
            should_fail: false,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Configure the mock to fail on synthesize
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Configure the mock to take `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// All `(text, language)` pairs requested so far
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, language: &str) -> Result<AudioClip> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((text.to_string(), language.to_string()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.should_fail {
            return Err(SightError::Speech {
                message: "mock speech failure".to_string(),
            });
        }
        Ok(AudioClip::new(
            format!("{language}:{text}").into_bytes(),
            "audio/mpeg",
        ))
    }
}
