//! Describe-and-speak pipeline.
//!
//! A [`session::SessionHandle`] gates incoming frames, runs at most one
//! [`Orchestrator`] pass at a time and publishes each result atomically into
//! [`SessionState`], which the presentation layer reads through snapshots.

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod session;
pub mod state;
pub mod types;

pub use error::{CollectingReporter, ErrorReporter, LogReporter, StageError};
pub use events::SessionEvent;
pub use orchestrator::{Orchestrator, OrchestratorConfig, PipelineOutcome, RunReport};
pub use session::{FrameDisposition, Session, SessionHandle, SourceSummary};
pub use state::{SessionSnapshot, SessionState, SessionUpdate};
pub use types::{AudioClip, Caption, TranslatedCaption};
