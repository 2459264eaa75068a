//! Live session: rate-limited frame intake feeding a single in-flight
//! pipeline run.
//!
//! Frames that pass the capture gate land in a one-slot mailbox; a newer
//! frame replaces an older one that has not started yet. At most one run is
//! in flight, so results are published in capture order. When the selected
//! language changes, the current caption is re-translated once the worker is
//! free.

use crate::defaults;
use crate::error::{Result, SightError};
use crate::frame::{Frame, FrameSource, RateLimiter};
use crate::languages::LanguageCatalog;
use crate::pipeline::events::SessionEvent;
use crate::pipeline::orchestrator::{Orchestrator, PipelineOutcome};
use crate::pipeline::state::{SessionSnapshot, SessionState};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// What happened to a submitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Rejected by the capture gate, or older than the frame already queued
    Dropped,
    /// A run was started for it
    Started,
    /// Waiting for the in-flight run; a newer frame may still replace it
    Queued,
}

/// Counters returned by [`SessionHandle::run_source`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceSummary {
    pub frames_seen: u64,
    pub frames_admitted: u64,
}

/// Session builder.
pub struct Session {
    orchestrator: Orchestrator,
    catalog: LanguageCatalog,
    capture_interval: Duration,
    event_tx: Option<crossbeam_channel::Sender<SessionEvent>>,
}

impl Session {
    /// Creates a session around `orchestrator` with the built-in languages
    /// and the default capture interval.
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            catalog: LanguageCatalog::default(),
            capture_interval: Duration::from_millis(defaults::CAPTURE_INTERVAL_MS),
            event_tx: None,
        }
    }

    /// Sets the languages the user may select.
    pub fn with_catalog(mut self, catalog: LanguageCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Sets the minimum time between captured frames.
    pub fn with_capture_interval(mut self, interval: Duration) -> Self {
        self.capture_interval = interval;
        self
    }

    /// Streams session events to `tx` (non-blocking; events are dropped
    /// when the channel is full).
    pub fn with_event_sender(mut self, tx: crossbeam_channel::Sender<SessionEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Starts the session. Must be called within a tokio runtime.
    pub fn start(self) -> SessionHandle {
        let (busy, _) = watch::channel(false);
        SessionHandle {
            inner: Arc::new(Inner {
                state: self.orchestrator.state().clone(),
                orchestrator: self.orchestrator,
                catalog: self.catalog,
                limiter: RateLimiter::new(self.capture_interval),
                pending: Mutex::new(None),
                retranslating: Mutex::new(None),
                abandoned: Mutex::new(None),
                busy,
                event_tx: self.event_tx,
            }),
        }
    }
}

struct Inner {
    orchestrator: Orchestrator,
    state: Arc<SessionState>,
    catalog: LanguageCatalog,
    limiter: RateLimiter,
    pending: Mutex<Option<Frame>>,
    /// Language and state revision of the re-translation in flight
    retranslating: Mutex<Option<(String, u64)>>,
    /// Re-translation that crashed the worker. Not retried until the
    /// selected language or the published result changes.
    abandoned: Mutex<Option<(String, u64)>>,
    /// True while a worker owns the pipeline
    busy: watch::Sender<bool>,
    event_tx: Option<crossbeam_channel::Sender<SessionEvent>>,
}

impl Inner {
    fn try_acquire(&self) -> bool {
        self.busy.send_if_modified(|busy| {
            if *busy {
                false
            } else {
                *busy = true;
                true
            }
        })
    }

    fn release(&self) {
        self.busy.send_replace(false);
    }

    fn take_pending(&self) -> Option<Frame> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Queues `frame` unless a newer one is already waiting.
    fn offer_pending(&self, frame: Frame) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(queued) = pending.as_ref() {
            if queued.timestamp > frame.timestamp {
                tracing::debug!(
                    timestamp_ms = frame.timestamp.as_millis() as u64,
                    "frame older than the queued one, dropped"
                );
                return false;
            }
            tracing::debug!(
                timestamp_ms = queued.timestamp.as_millis() as u64,
                "queued frame superseded by a newer one"
            );
        }
        *pending = Some(frame);
        true
    }

    fn needs_retranslation(&self, snapshot: &SessionSnapshot) -> bool {
        if !snapshot.needs_retranslation() {
            return false;
        }
        let abandoned = self.abandoned.lock().unwrap_or_else(|e| e.into_inner());
        abandoned.as_ref()
            != Some(&(snapshot.selected_language.clone(), snapshot.revision))
    }

    fn has_work(&self) -> bool {
        self.has_pending() || self.needs_retranslation(&self.state.snapshot())
    }

    /// Records that the worker died, so a crashing re-translation is not
    /// retried forever.
    fn worker_crashed(&self) {
        let job = self
            .retranslating
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some((language, revision)) = job {
            tracing::warn!(%language, revision, "giving up on re-translation");
            *self.abandoned.lock().unwrap_or_else(|e| e.into_inner()) = Some((language, revision));
        }
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.event_tx
            && tx.try_send(event).is_err()
        {
            tracing::debug!("session event dropped (channel full or closed)");
        }
    }

    fn emit_outcome(&self, outcome: &PipelineOutcome, timestamp: Duration) {
        let timestamp_ms = timestamp.as_millis() as u64;
        match outcome {
            PipelineOutcome::Published(report) => self.emit(SessionEvent::CaptionReady {
                timestamp_ms,
                caption: report.caption.text.clone(),
                translated: report.translated.text.clone(),
                language: report.translated.language.clone(),
                has_audio: report.audio.is_some(),
                warnings: report.warnings.iter().map(ToString::to_string).collect(),
            }),
            PipelineOutcome::CaptionFailed(error) => self.emit(SessionEvent::RunFailed {
                timestamp_ms,
                message: error.to_string(),
            }),
            PipelineOutcome::Stale(_) => {}
        }
    }
}

/// Handle to a running session. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Inner>,
}

impl SessionHandle {
    /// Offers a frame to the session. Never blocks.
    pub fn submit_frame(&self, frame: Frame) -> FrameDisposition {
        if !self.inner.limiter.decide(frame.timestamp) {
            tracing::trace!(
                timestamp_ms = frame.timestamp.as_millis() as u64,
                "frame dropped by capture gate"
            );
            return FrameDisposition::Dropped;
        }

        if !self.inner.offer_pending(frame) {
            return FrameDisposition::Dropped;
        }

        if self.inner.try_acquire() {
            spawn_worker(self.inner.clone());
            FrameDisposition::Started
        } else {
            FrameDisposition::Queued
        }
    }

    /// Changes the selected language.
    ///
    /// The current caption, if any, is re-translated and re-spoken; an
    /// in-flight run finishes in the language it started with first.
    pub fn set_language(&self, code: &str) -> Result<()> {
        let language = self.inner.catalog.resolve(code)?;
        let previous = self.inner.state.set_language(&language.code);
        if previous == language.code {
            return Ok(());
        }

        tracing::info!(from = %previous, to = %language.code, "language changed");
        self.inner.emit(SessionEvent::LanguageChanged {
            language: language.code.clone(),
        });

        if self.inner.needs_retranslation(&self.inner.state.snapshot()) && self.inner.try_acquire()
        {
            spawn_worker(self.inner.clone());
        }
        Ok(())
    }

    /// Returns a consistent copy of the session state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.snapshot()
    }

    /// Shared state, for readers that must not keep the session alive.
    pub fn state(&self) -> Arc<SessionState> {
        self.inner.state.clone()
    }

    pub fn catalog(&self) -> &LanguageCatalog {
        &self.inner.catalog
    }

    /// Returns true while a run is in flight.
    pub fn is_busy(&self) -> bool {
        *self.inner.busy.borrow()
    }

    /// Waits until no run is in flight and no work is queued.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.busy.subscribe();
        loop {
            let closed = rx.wait_for(|busy| !*busy).await.is_err();
            if closed {
                return;
            }
            if !self.inner.has_work() {
                return;
            }
            // The worker is between releasing and re-acquiring.
            tokio::task::yield_now().await;
        }
    }

    /// Pumps frames from `source` into the session until it is exhausted,
    /// then waits for the last run to finish.
    ///
    /// Gives up after too many consecutive source errors. A finite source
    /// that runs dry without producing a single frame reports its last
    /// error.
    pub async fn run_source(&self, source: &mut dyn FrameSource) -> Result<SourceSummary> {
        let mut summary = SourceSummary::default();
        let mut consecutive_errors: u32 = 0;
        let mut last_error = None;

        loop {
            match source.next_frame().await {
                Ok(Some(frame)) => {
                    consecutive_errors = 0;
                    summary.frames_seen += 1;
                    if self.submit_frame(frame) != FrameDisposition::Dropped {
                        summary.frames_admitted += 1;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    consecutive_errors += 1;
                    tracing::warn!(consecutive_errors, "frame source error: {e}");
                    if consecutive_errors >= defaults::MAX_CONSECUTIVE_SOURCE_ERRORS {
                        self.wait_idle().await;
                        return Err(SightError::FrameSource {
                            message: format!(
                                "failed {consecutive_errors} times in a row, last error: {e}"
                            ),
                        });
                    }
                    last_error = Some(e);
                }
            }
        }

        self.wait_idle().await;
        if source.is_finite()
            && summary.frames_seen == 0
            && let Some(e) = last_error
        {
            return Err(e);
        }
        tracing::debug!(
            frames_seen = summary.frames_seen,
            frames_admitted = summary.frames_admitted,
            "frame source finished"
        );
        Ok(summary)
    }
}

fn spawn_worker(inner: Arc<Inner>) {
    tokio::spawn(async move {
        let worker = tokio::spawn(run_worker(inner.clone()));
        if let Err(e) = worker.await {
            tracing::error!("pipeline worker panicked: {e}");
            inner.worker_crashed();
            inner.release();
            if inner.has_work() && inner.try_acquire() {
                spawn_worker(inner);
            }
        }
    });
}

/// Drains queued frames and language changes. Runs while holding the busy
/// flag.
async fn run_worker(inner: Arc<Inner>) {
    loop {
        if let Some(frame) = inner.take_pending() {
            let language = inner.state.selected_language();
            let timestamp = frame.timestamp;
            let outcome = inner.orchestrator.process(frame, &language).await;
            inner.emit_outcome(&outcome, timestamp);
            continue;
        }

        let snapshot = inner.state.snapshot();
        if inner.needs_retranslation(&snapshot)
            && let Some(caption) = snapshot.latest_caption
        {
            *inner
                .retranslating
                .lock()
                .unwrap_or_else(|e| e.into_inner()) =
                Some((snapshot.selected_language.clone(), snapshot.revision));
            let outcome = inner
                .orchestrator
                .retranslate(&caption, &snapshot.selected_language)
                .await;
            *inner
                .retranslating
                .lock()
                .unwrap_or_else(|e| e.into_inner()) = None;
            inner.emit_outcome(&outcome, caption.source_timestamp);
            continue;
        }

        inner.release();
        // A frame may have arrived after the last check but before release.
        if inner.has_work() && inner.try_acquire() {
            continue;
        }
        break;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{ImageData, MockFrameSource};
    use crate::pipeline::orchestrator::OrchestratorConfig;
    use crate::services::{MockCaptioner, MockSynthesizer, MockTranslator, Translator};
    use async_trait::async_trait;

    struct CrashingTranslator;

    #[async_trait]
    impl Translator for CrashingTranslator {
        async fn translate(&self, _text: &str, _target_language: &str) -> Result<String> {
            panic!("translator crashed");
        }
    }

    fn frame_at(millis: u64) -> Frame {
        Frame::new(
            ImageData::new(vec![0u8; 4], "image/png"),
            Duration::from_millis(millis),
            millis,
        )
    }

    fn session(captioner: MockCaptioner, translator: MockTranslator) -> Session {
        let orchestrator = Orchestrator::new(
            Arc::new(captioner),
            Arc::new(translator),
            Arc::new(MockSynthesizer::new()),
            Arc::new(SessionState::new("en")),
            OrchestratorConfig::default(),
        );
        Session::new(orchestrator)
    }

    #[tokio::test]
    async fn test_rate_limited_frames_are_dropped() {
        let captioner = MockCaptioner::new();
        let handle = session(captioner.clone(), MockTranslator::new()).start();

        assert_eq!(handle.submit_frame(frame_at(0)), FrameDisposition::Started);
        assert_eq!(handle.submit_frame(frame_at(1000)), FrameDisposition::Dropped);
        handle.wait_idle().await;
        assert_eq!(captioner.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_pending_frame_wins() {
        let captioner = MockCaptioner::new().with_delay(Duration::from_secs(5));
        let handle = session(captioner.clone(), MockTranslator::new())
            .with_capture_interval(Duration::from_millis(100))
            .start();

        assert_eq!(handle.submit_frame(frame_at(0)), FrameDisposition::Started);
        // Let the worker pick up the first frame
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.submit_frame(frame_at(200)), FrameDisposition::Queued);
        assert_eq!(handle.submit_frame(frame_at(400)), FrameDisposition::Queued);
        handle.wait_idle().await;

        assert_eq!(captioner.call_count(), 2);
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.source_timestamp, Some(Duration::from_millis(400)));
        assert_eq!(snapshot.revision, 2);
    }

    #[tokio::test]
    async fn test_set_language_retranslates_current_caption() {
        let captioner = MockCaptioner::new().with_response("a dog running on grass");
        let translator =
            MockTranslator::new().with_translation("hi", "घास पर दौड़ता हुआ कुत्ता");
        let handle = session(captioner.clone(), translator.clone()).start();

        handle.submit_frame(frame_at(0));
        handle.wait_idle().await;
        assert_eq!(translator.call_count(), 0);

        handle.set_language("hi").unwrap();
        handle.wait_idle().await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.selected_language, "hi");
        assert_eq!(
            snapshot.latest_translated_caption.unwrap().text,
            "घास पर दौड़ता हुआ कुत्ता"
        );
        assert_eq!(captioner.call_count(), 1);
        assert_eq!(translator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_set_same_language_is_noop() {
        let translator = MockTranslator::new();
        let (tx, rx) = crossbeam_channel::bounded(8);
        let handle = session(MockCaptioner::new(), translator.clone())
            .with_event_sender(tx)
            .start();
        handle.set_language("en").unwrap();
        handle.wait_idle().await;
        assert!(rx.try_recv().is_err());
        assert_eq!(translator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_language_is_rejected() {
        let handle = session(MockCaptioner::new(), MockTranslator::new()).start();
        match handle.set_language("xx") {
            Err(SightError::UnsupportedLanguage { code }) => assert_eq!(code, "xx"),
            other => panic!("Expected UnsupportedLanguage, got {:?}", other),
        }
        assert_eq!(handle.snapshot().selected_language, "en");
    }

    #[tokio::test]
    async fn test_language_change_without_caption_does_nothing() {
        let translator = MockTranslator::new();
        let handle = session(MockCaptioner::new(), translator.clone()).start();
        handle.set_language("ta").unwrap();
        handle.wait_idle().await;
        assert_eq!(translator.call_count(), 0);
        assert!(!handle.is_busy());
    }

    #[tokio::test]
    async fn test_events_are_streamed() {
        let (tx, rx) = crossbeam_channel::bounded(8);
        let handle = session(
            MockCaptioner::new().with_response("a red car"),
            MockTranslator::new(),
        )
        .with_event_sender(tx)
        .start();

        handle.submit_frame(frame_at(0));
        handle.wait_idle().await;

        match rx.try_recv().unwrap() {
            SessionEvent::CaptionReady {
                caption,
                language,
                has_audio,
                ..
            } => {
                assert_eq!(caption, "a red car");
                assert_eq!(language, "en");
                assert!(has_audio);
            }
            other => panic!("Expected CaptionReady, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_caption_failure_emits_run_failed() {
        let (tx, rx) = crossbeam_channel::bounded(8);
        let handle = session(MockCaptioner::new().with_failure(), MockTranslator::new())
            .with_event_sender(tx)
            .start();

        handle.submit_frame(frame_at(0));
        handle.wait_idle().await;

        assert!(matches!(
            rx.try_recv().unwrap(),
            SessionEvent::RunFailed { timestamp_ms: 0, .. }
        ));
        assert!(handle.snapshot().latest_caption.is_none());
    }

    #[tokio::test]
    async fn test_run_source_applies_capture_interval() {
        let captioner = MockCaptioner::new();
        let handle = session(captioner.clone(), MockTranslator::new()).start();
        let mut source = MockFrameSource::new(vec![
            Duration::from_secs(0),
            Duration::from_secs(1),
            Duration::from_secs(4),
        ]);

        let summary = handle.run_source(&mut source).await.unwrap();
        assert_eq!(summary.frames_seen, 3);
        assert_eq!(summary.frames_admitted, 2);
        assert!(captioner.call_count() >= 1);
        assert_eq!(
            handle.snapshot().source_timestamp,
            Some(Duration::from_secs(4))
        );
    }

    #[tokio::test]
    async fn test_run_source_gives_up_after_repeated_errors() {
        let handle = session(MockCaptioner::new(), MockTranslator::new()).start();
        let mut source = MockFrameSource::new(vec![Duration::ZERO])
            .with_failures(defaults::MAX_CONSECUTIVE_SOURCE_ERRORS);

        match handle.run_source(&mut source).await {
            Err(SightError::FrameSource { message }) => {
                assert!(message.contains("10 times in a row"), "{message}");
            }
            other => panic!("Expected FrameSource error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_source_recovers_from_transient_errors() {
        let handle = session(MockCaptioner::new(), MockTranslator::new()).start();
        let mut source = MockFrameSource::new(vec![Duration::ZERO]).with_failures(3);

        let summary = handle.run_source(&mut source).await.unwrap();
        assert_eq!(summary.frames_seen, 1);
        assert!(handle.snapshot().latest_caption.is_some());
    }

    #[test]
    fn test_older_frame_never_replaces_queued_one() {
        let handle = session(MockCaptioner::new(), MockTranslator::new()).start();
        assert!(handle.inner.offer_pending(frame_at(400)));
        assert!(!handle.inner.offer_pending(frame_at(200)));
        assert!(handle.inner.offer_pending(frame_at(600)));
        assert_eq!(
            handle.inner.take_pending().unwrap().timestamp,
            Duration::from_millis(600)
        );
    }

    #[tokio::test]
    async fn test_crashing_retranslation_does_not_hang_session() {
        let orchestrator = Orchestrator::new(
            Arc::new(MockCaptioner::new().with_response("a cat on a sofa")),
            Arc::new(CrashingTranslator),
            Arc::new(MockSynthesizer::new()),
            Arc::new(SessionState::new("en")),
            OrchestratorConfig::default(),
        );
        let handle = Session::new(orchestrator).start();

        handle.submit_frame(frame_at(0));
        handle.wait_idle().await;
        handle.set_language("hi").unwrap();

        let idle = tokio::time::timeout(Duration::from_secs(2), handle.wait_idle()).await;
        assert!(idle.is_ok(), "wait_idle did not return");
        assert!(!handle.is_busy());
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.selected_language, "hi");
        assert_eq!(snapshot.latest_translated_caption.unwrap().language, "en");
    }

    #[tokio::test]
    async fn test_session_recovers_after_crashed_retranslation() {
        let captioner = MockCaptioner::new().with_response("a cat on a sofa");
        let orchestrator = Orchestrator::new(
            Arc::new(captioner.clone()),
            Arc::new(CrashingTranslator),
            Arc::new(MockSynthesizer::new()),
            Arc::new(SessionState::new("en")),
            OrchestratorConfig::default(),
        );
        let handle = Session::new(orchestrator).start();

        handle.submit_frame(frame_at(0));
        handle.wait_idle().await;
        handle.set_language("hi").unwrap();
        handle.wait_idle().await;

        // Switching back needs no translator, so the session recovers
        handle.set_language("en").unwrap();
        handle.submit_frame(frame_at(5000));
        handle.wait_idle().await;
        assert_eq!(captioner.call_count(), 2);
        assert_eq!(
            handle.snapshot().source_timestamp,
            Some(Duration::from_millis(5000))
        );
    }

    #[tokio::test]
    async fn test_finite_source_without_frames_reports_its_error() {
        let handle = session(MockCaptioner::new(), MockTranslator::new()).start();
        let mut source = MockFrameSource::new(vec![]).with_failures(1);

        match handle.run_source(&mut source).await {
            Err(SightError::FrameSource { message }) => assert_eq!(message, "mock camera error"),
            other => panic!("Expected FrameSource error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_live_source_without_frames_ends_quietly() {
        let handle = session(MockCaptioner::new(), MockTranslator::new()).start();
        let mut source = MockFrameSource::new(vec![]).with_failures(1).with_infinite();

        let summary = handle.run_source(&mut source).await.unwrap();
        assert_eq!(summary, SourceSummary::default());
    }

    #[tokio::test]
    async fn test_run_source_gives_up_on_broken_camera() {
        let captioner = MockCaptioner::new();
        let handle = session(captioner.clone(), MockTranslator::new()).start();
        let mut source = MockFrameSource::new(vec![Duration::ZERO])
            .with_read_failure()
            .with_infinite();

        assert!(handle.run_source(&mut source).await.is_err());
        assert_eq!(captioner.call_count(), 0);
    }
}
