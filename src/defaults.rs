//! Default configuration constants for sightspeak.
//!
//! Shared by the config file types, the pipeline and the CLI so that the
//! same values apply no matter which entry point builds a session.

/// Minimum time between two captured frames, in milliseconds.
///
/// One description every three seconds keeps the captioning service under
/// its free-tier rate limit while still tracking a moving scene.
pub const CAPTURE_INTERVAL_MS: u64 = 3000;

/// Language the captioning model produces. Captions in this language are
/// never sent through the translator.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Upper bound for a single captioning call, in milliseconds.
///
/// Hosted models can take a while to warm up on the first request.
pub const CAPTION_TIMEOUT_MS: u64 = 30_000;

/// Upper bound for a single translation call, in milliseconds.
pub const TRANSLATION_TIMEOUT_MS: u64 = 10_000;

/// Upper bound for a single speech synthesis call, in milliseconds.
pub const SPEECH_TIMEOUT_MS: u64 = 15_000;

/// Interval between frames replayed by a directory camera, in milliseconds.
pub const FRAME_PERIOD_MS: u64 = 1000;

/// Consecutive frame source errors tolerated before the session loop gives up.
pub const MAX_CONSECUTIVE_SOURCE_ERRORS: u32 = 10;

/// Hosted image captioning model.
pub const CAPTION_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/Salesforce/blip-image-captioning-large";

/// LibreTranslate-compatible translation server.
pub const TRANSLATION_ENDPOINT: &str = "https://libretranslate.com";

/// Google Translate speech endpoint (the one gTTS uses).
pub const SPEECH_ENDPOINT: &str = "https://translate.google.com/translate_tts";

/// Client identifier the speech endpoint expects.
pub const SPEECH_CLIENT: &str = "tw-ob";

/// Longest piece of text the speech endpoint accepts in one request.
pub const SPEECH_MAX_CHARS: usize = 100;

/// Built-in language table: (code, display name).
pub const LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("ta", "Tamil"),
    ("hi", "Hindi"),
    ("te", "Telugu"),
    ("ml", "Malayalam"),
    ("kn", "Kannada"),
];
