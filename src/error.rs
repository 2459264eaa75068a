//! Error types for sightspeak.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SightError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Frame errors
    #[error("Frame source failed: {message}")]
    FrameSource { message: String },

    #[error("Unsupported image format: {message}")]
    UnsupportedImage { message: String },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    // External service errors
    #[error("Captioning failed: {message}")]
    Captioning { message: String },

    #[error("Translation failed: {message}")]
    Translation { message: String },

    #[error("Speech synthesis failed: {message}")]
    Speech { message: String },

    #[error("{service} timed out after {}ms", .after.as_millis())]
    Timeout {
        service: &'static str,
        after: Duration,
    },

    // Session errors
    #[error("Unsupported language: {code}")]
    UnsupportedLanguage { code: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, SightError>;
