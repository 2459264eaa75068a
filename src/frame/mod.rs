//! Frame intake: camera-like sources and the capture gate in front of the
//! pipeline.

pub mod rate_limiter;
pub mod source;
pub mod types;

pub use rate_limiter::RateLimiter;
pub use source::{DirectorySource, FrameSource, MockFrameSource, PhotoSource};
pub use types::{Frame, ImageData};
