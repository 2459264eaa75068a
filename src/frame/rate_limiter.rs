//! Capture gate: decides which incoming frames are worth describing.

use crate::defaults;
use std::sync::Mutex;
use std::time::Duration;
use tracing::trace;

/// Admits at most one frame per `interval`.
///
/// The very first frame is always admitted. Admission and the update of the
/// last capture time happen under one lock, so two callers racing with
/// timestamps inside the same interval cannot both pass.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_capture: Mutex<Option<Duration>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_capture: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true if a frame arriving at `timestamp` should be processed.
    ///
    /// Timestamps earlier than the last admitted one are rejected, so a late
    /// frame never reopens a window that has already been decided.
    pub fn decide(&self, timestamp: Duration) -> bool {
        let mut last = self
            .last_capture
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let eligible = match *last {
            None => true,
            Some(prev) => timestamp
                .checked_sub(prev)
                .is_some_and(|gap| gap >= self.interval),
        };

        if eligible {
            *last = Some(timestamp);
        }
        trace!(?timestamp, eligible, "capture gate");
        eligible
    }

    /// Timestamp of the last admitted frame.
    pub fn last_capture(&self) -> Option<Duration> {
        *self
            .last_capture
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Forgets the last capture; the next frame is admitted unconditionally.
    pub fn reset(&self) {
        *self
            .last_capture
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(defaults::CAPTURE_INTERVAL_MS))
    }
}
