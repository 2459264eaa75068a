//! sightspeak - Spoken scene descriptions from a camera
//!
//! Captions camera frames with a hosted vision model, translates the caption
//! into the listener's language and speaks it.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod frame;
pub mod languages;
#[cfg(feature = "cli")]
pub mod output;
pub mod pipeline;
pub mod services;

// Composition root - needs the HTTP adapters and the terminal front end
#[cfg(all(feature = "cli", feature = "http"))]
pub mod app;

// Service contracts (caption → translate → speak)
pub use frame::FrameSource;
pub use services::{Captioner, SpeechSynthesizer, Translator};

// Pipeline
pub use pipeline::{
    FrameDisposition, Orchestrator, OrchestratorConfig, PipelineOutcome, Session, SessionEvent,
    SessionHandle, SessionSnapshot, SessionState,
};

// Error handling
pub use error::{Result, SightError};
pub use pipeline::{ErrorReporter, StageError};

// Config
pub use config::Config;
pub use languages::{Language, LanguageCatalog};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
