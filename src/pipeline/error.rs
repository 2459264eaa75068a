//! Stage errors and reporting for pipeline runs.

use std::sync::Mutex;
use std::time::Duration;

/// Errors that can occur while processing one frame.
///
/// Only a captioning failure aborts a run; translation and speech failures
/// degrade the published result instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("captioning failed: {reason}")]
    CaptionFailed { reason: String },

    #[error("translation to '{language}' failed: {reason}")]
    TranslationFailed { language: String, reason: String },

    #[error("speech synthesis in '{language}' failed: {reason}")]
    SpeechFailed { language: String, reason: String },

    #[error(
        "result for frame at {}ms is older than published frame at {}ms",
        .frame_timestamp.as_millis(),
        .published_timestamp.as_millis()
    )]
    StaleResult {
        frame_timestamp: Duration,
        published_timestamp: Duration,
    },
}

impl StageError {
    /// Returns true when the run produced nothing publishable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StageError::CaptionFailed { .. })
    }

    /// Name of the stage that raised the error.
    pub fn stage(&self) -> &'static str {
        match self {
            StageError::CaptionFailed { .. } => "caption",
            StageError::TranslationFailed { .. } => "translate",
            StageError::SpeechFailed { .. } => "speech",
            StageError::StaleResult { .. } => "publish",
        }
    }
}

/// Trait for reporting stage errors.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error from a stage.
    fn report(&self, stage: &str, error: &StageError);
}

/// Error reporter that logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, stage: &str, error: &StageError) {
        match error {
            StageError::CaptionFailed { .. } => tracing::error!(stage, "{error}"),
            StageError::StaleResult { .. } => tracing::debug!(stage, "{error}"),
            _ => tracing::warn!(stage, "{error}"),
        }
    }
}

/// Reporter that keeps every error it sees, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    errors: Mutex<Vec<(String, StageError)>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(stage, error)` pairs reported so far.
    pub fn errors(&self) -> Vec<(String, StageError)> {
        self.errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, stage: &str, error: &StageError) {
        self.errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((stage.to_string(), error.clone()));
    }
}
