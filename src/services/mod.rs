//! Contracts for the external captioning, translation and speech services,
//! with HTTP-backed and mock implementations.

pub mod captioning;
pub mod speech;
pub mod translation;

#[cfg(feature = "http")]
pub use captioning::HttpCaptioner;
pub use captioning::{Captioner, MockCaptioner};
#[cfg(feature = "http")]
pub use speech::GoogleTtsSynthesizer;
pub use speech::{MockSynthesizer, SpeechSynthesizer};
#[cfg(feature = "http")]
pub use translation::HttpTranslator;
pub use translation::{MockTranslator, Translator};
