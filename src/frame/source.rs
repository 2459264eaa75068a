use crate::error::{Result, SightError};
use crate::frame::types::{Frame, ImageData};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Trait for camera-like frame producers.
///
/// This trait allows swapping implementations (photo upload, replayed
/// camera, mock).
#[async_trait]
pub trait FrameSource: Send {
    /// Waits for the next frame.
    ///
    /// # Returns
    /// `Some(frame)`, `None` once a finite source is exhausted, or an error
    async fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Returns true if the source eventually runs dry (photo upload, one
    /// pass over a directory). Live cameras return false.
    fn is_finite(&self) -> bool;
}

/// A single uploaded photo.
#[derive(Debug, Clone)]
pub struct PhotoSource {
    path: PathBuf,
    delivered: bool,
}

impl PhotoSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delivered: false,
        }
    }
}

#[async_trait]
impl FrameSource for PhotoSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.delivered {
            return Ok(None);
        }
        self.delivered = true;
        let image = read_image(&self.path).await?;
        Ok(Some(Frame::new(image, Duration::ZERO, 0)))
    }

    fn is_finite(&self) -> bool {
        true
    }
}

/// Replays the PNG/JPEG files of a directory as a camera feed.
///
/// Files are played in name order, one every `period`, looping forever
/// unless `once` is set. Timestamps come from the monotonic clock.
pub struct DirectorySource {
    files: Vec<PathBuf>,
    period: Duration,
    once: bool,
    next_index: usize,
    /// Files read so far, successfully or not
    visited: usize,
    sequence: u64,
    started: Option<Instant>,
    ticker: Option<Interval>,
}

impl DirectorySource {
    /// Scans `dir` for image files.
    ///
    /// # Errors
    /// Fails if the directory cannot be read or holds no PNG/JPEG files.
    pub fn new(dir: &Path, period: Duration) -> Result<Self> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(SightError::FrameSource {
                message: format!("no PNG or JPEG files in {}", dir.display()),
            });
        }

        Ok(Self {
            files,
            period,
            once: false,
            next_index: 0,
            visited: 0,
            sequence: 0,
            started: None,
            ticker: None,
        })
    }

    /// Stop after one pass over the directory.
    pub fn with_once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl FrameSource for DirectorySource {
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.once && self.visited >= self.files.len() {
            return Ok(None);
        }

        let period = self.period;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        ticker.tick().await;

        let started = *self.started.get_or_insert_with(Instant::now);
        let path = &self.files[self.next_index];
        self.next_index = (self.next_index + 1) % self.files.len();
        self.visited += 1;

        let image = read_image(path).await?;
        let frame = Frame::new(image, started.elapsed(), self.sequence);
        self.sequence += 1;
        Ok(Some(frame))
    }

    fn is_finite(&self) -> bool {
        self.once
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}

async fn read_image(path: &Path) -> Result<ImageData> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| SightError::FrameSource {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
    ImageData::from_encoded(bytes)
}

/// Mock frame source for testing.
///
/// Emits one frame per scripted timestamp, then reports exhaustion.
#[derive(Debug, Clone)]
pub struct MockFrameSource {
    timestamps: VecDeque<Duration>,
    sequence: u64,
    failures_before_frames: u32,
    always_fail: bool,
    finite: bool,
}

impl MockFrameSource {
    pub fn new(timestamps: Vec<Duration>) -> Self {
        Self {
            timestamps: timestamps.into(),
            sequence: 0,
            failures_before_frames: 0,
            always_fail: false,
            finite: true,
        }
    }

    /// Fail `count` reads before the first frame is produced.
    pub fn with_failures(mut self, count: u32) -> Self {
        self.failures_before_frames = count;
        self
    }

    /// Fail every read.
    pub fn with_read_failure(mut self) -> Self {
        self.always_fail = true;
        self
    }

    /// Report the source as a live (infinite) camera.
    pub fn with_infinite(mut self) -> Self {
        self.finite = false;
        self
    }
}

#[async_trait]
impl FrameSource for MockFrameSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.always_fail || self.failures_before_frames > 0 {
            self.failures_before_frames = self.failures_before_frames.saturating_sub(1);
            return Err(SightError::FrameSource {
                message: "mock camera error".to_string(),
            });
        }

        let Some(timestamp) = self.timestamps.pop_front() else {
            return Ok(None);
        };
        let image = ImageData::new(format!("frame-{}", self.sequence).into_bytes(), "image/png");
        let frame = Frame::new(image, timestamp, self.sequence);
        self.sequence += 1;
        Ok(Some(frame))
    }

    fn is_finite(&self) -> bool {
        self.finite
    }
}
