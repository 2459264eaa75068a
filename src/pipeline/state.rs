//! Shared session state read by the presentation layer.
//!
//! Writers publish a whole run at once through [`SessionState::apply_update`]
//! so readers never see a caption from one frame next to audio from another.

use crate::frame::Frame;
use crate::pipeline::error::StageError;
use crate::pipeline::types::{AudioClip, Caption, TranslatedCaption};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Point-in-time copy of the session state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub selected_language: String,
    pub latest_frame: Option<Frame>,
    pub latest_caption: Option<Caption>,
    pub latest_translated_caption: Option<TranslatedCaption>,
    pub latest_audio: Option<Arc<AudioClip>>,
    /// Timestamp of the frame the published results were derived from.
    pub source_timestamp: Option<Duration>,
    /// Number of updates published so far.
    pub revision: u64,
}

impl SessionSnapshot {
    /// Returns true when the published translation no longer matches the
    /// selected language.
    pub fn needs_retranslation(&self) -> bool {
        match (&self.latest_caption, &self.latest_translated_caption) {
            (Some(_), Some(translated)) => translated.language != self.selected_language,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

/// One run's results, published together.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    /// New frame, or `None` to keep the current one (re-translation).
    pub frame: Option<Frame>,
    pub caption: Caption,
    pub translated: TranslatedCaption,
    /// Speech for `translated`; `None` clears any previous clip.
    pub audio: Option<Arc<AudioClip>>,
}

/// Session state behind a reader/writer lock.
#[derive(Debug)]
pub struct SessionState {
    inner: RwLock<SessionSnapshot>,
}

impl SessionState {
    pub fn new(selected_language: &str) -> Self {
        Self {
            inner: RwLock::new(SessionSnapshot {
                selected_language: selected_language.to_string(),
                latest_frame: None,
                latest_caption: None,
                latest_translated_caption: None,
                latest_audio: None,
                source_timestamp: None,
                revision: 0,
            }),
        }
    }

    /// Returns a consistent copy of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn selected_language(&self) -> String {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .selected_language
            .clone()
    }

    /// Changes the selected language, returning the previous one.
    pub fn set_language(&self, language: &str) -> String {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut inner.selected_language, language.to_string())
    }

    /// Atomically publishes a run's results.
    ///
    /// Results derived from a frame strictly older than the one already
    /// published are rejected with [`StageError::StaleResult`] and leave the
    /// state untouched. Equal timestamps are accepted so a re-translation of
    /// the current caption can replace the previous translation.
    pub fn apply_update(
        &self,
        update: SessionUpdate,
        source_timestamp: Duration,
    ) -> Result<(), StageError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        if let Some(published) = inner.source_timestamp
            && source_timestamp < published
        {
            return Err(StageError::StaleResult {
                frame_timestamp: source_timestamp,
                published_timestamp: published,
            });
        }

        if let Some(frame) = update.frame {
            inner.latest_frame = Some(frame);
        }
        inner.latest_caption = Some(update.caption);
        inner.latest_translated_caption = Some(update.translated);
        inner.latest_audio = update.audio;
        inner.source_timestamp = Some(source_timestamp);
        inner.revision += 1;
        Ok(())
    }
}
