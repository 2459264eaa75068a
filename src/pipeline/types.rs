//! Data types flowing through the caption → translate → speak pipeline.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::time::Duration;

/// Raw captioning output for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    pub text: String,
    /// Timestamp of the frame this caption describes.
    pub source_timestamp: Duration,
}

impl Caption {
    pub fn new(text: impl Into<String>, source_timestamp: Duration) -> Self {
        Self {
            text: text.into(),
            source_timestamp,
        }
    }
}

/// Caption text in the language it will be spoken in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedCaption {
    pub text: String,
    /// Language code the text was produced for.
    pub language: String,
}

impl TranslatedCaption {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
        }
    }
}

/// Synthesized speech.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, mime_type: &str) -> Self {
        Self {
            bytes,
            mime_type: mime_type.to_string(),
        }
    }

    /// Encodes the clip as a `data:` URL, playable by an `<audio>` element.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }

    /// File extension matching the MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/wav" | "audio/x-wav" => "wav",
            "audio/ogg" => "ogg",
            _ => "bin",
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Audio payloads can be large; keep them out of debug output.
impl std::fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioClip")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
