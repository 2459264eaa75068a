//! Session events streamed to the presentation layer.

use serde::{Deserialize, Serialize};

/// Events emitted by a running session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A new description was published
    CaptionReady {
        /// Source frame timestamp in milliseconds
        timestamp_ms: u64,
        caption: String,
        translated: String,
        language: String,
        has_audio: bool,
        /// Non-fatal problems hit while producing this result
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    /// A run produced nothing (captioning failed)
    RunFailed { timestamp_ms: u64, message: String },
    /// The selected language changed
    LanguageChanged { language: String },
}

impl SessionEvent {
    /// Serialize event to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize event from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
