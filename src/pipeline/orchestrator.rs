//! One pipeline run: caption → translate → speak → publish.

use crate::defaults;
use crate::error::{Result, SightError};
use crate::frame::Frame;
use crate::pipeline::error::{ErrorReporter, LogReporter, StageError};
use crate::pipeline::state::{SessionState, SessionUpdate};
use crate::pipeline::types::{AudioClip, Caption, TranslatedCaption};
use crate::services::{Captioner, SpeechSynthesizer, Translator};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Language the captioner writes in; never sent to the translator
    pub default_language: String,
    /// Upper bound for one captioning call
    pub caption_timeout: Duration,
    /// Upper bound for one translation call
    pub translation_timeout: Duration,
    /// Upper bound for one speech synthesis call
    pub speech_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_language: defaults::DEFAULT_LANGUAGE.to_string(),
            caption_timeout: Duration::from_millis(defaults::CAPTION_TIMEOUT_MS),
            translation_timeout: Duration::from_millis(defaults::TRANSLATION_TIMEOUT_MS),
            speech_timeout: Duration::from_millis(defaults::SPEECH_TIMEOUT_MS),
        }
    }
}

/// What a published run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub caption: Caption,
    pub translated: TranslatedCaption,
    pub audio: Option<Arc<AudioClip>>,
    /// Non-fatal stage failures, each reported once
    pub warnings: Vec<StageError>,
    pub elapsed: Duration,
}

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// Results were published to the session state
    Published(RunReport),
    /// Captioning failed; the state was not touched
    CaptionFailed(StageError),
    /// A newer frame was already published; the results were discarded
    Stale(StageError),
}

impl PipelineOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PipelineOutcome::Published(_))
    }

    pub fn report(&self) -> Option<&RunReport> {
        match self {
            PipelineOutcome::Published(report) => Some(report),
            _ => None,
        }
    }
}

/// Runs the captioning, translation and speech services for one frame and
/// publishes the results.
///
/// Holds no per-run state; concurrent runs are safe and their publication
/// order is enforced by [`SessionState::apply_update`].
pub struct Orchestrator {
    captioner: Arc<dyn Captioner>,
    translator: Arc<dyn Translator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    state: Arc<SessionState>,
    config: OrchestratorConfig,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl Orchestrator {
    /// Creates a new orchestrator with the default error reporter.
    pub fn new(
        captioner: Arc<dyn Captioner>,
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        state: Arc<SessionState>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            captioner,
            translator,
            synthesizer,
            state,
            config,
            error_reporter: Arc::new(LogReporter),
        }
    }

    /// Sets a custom error reporter.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Describes `frame`, translates the caption into `selected_language`,
    /// speaks it and publishes everything at once.
    ///
    /// A captioning failure ends the run without touching the state.
    /// Translation and speech failures degrade the result: the caption is
    /// spoken untranslated, or published without audio.
    pub async fn process(&self, frame: Frame, selected_language: &str) -> PipelineOutcome {
        let started = Instant::now();
        tracing::debug!(
            sequence = frame.sequence,
            timestamp_ms = frame.timestamp.as_millis() as u64,
            language = selected_language,
            "processing frame"
        );

        let captioned = with_timeout(
            "captioning",
            self.config.caption_timeout,
            self.captioner.caption(&frame.image),
        )
        .await;

        let caption = match captioned {
            Ok(text) => Caption::new(text, frame.timestamp),
            Err(e) => {
                let error = StageError::CaptionFailed {
                    reason: e.to_string(),
                };
                self.error_reporter.report(error.stage(), &error);
                return PipelineOutcome::CaptionFailed(error);
            }
        };

        self.finish(Some(frame), caption, selected_language, started)
            .await
    }

    /// Re-derives the translation and speech of an already published
    /// caption for `new_language`, leaving the frame and caption as they are.
    pub async fn retranslate(&self, current: &Caption, new_language: &str) -> PipelineOutcome {
        tracing::debug!(
            timestamp_ms = current.source_timestamp.as_millis() as u64,
            language = new_language,
            "re-translating caption"
        );
        self.finish(None, current.clone(), new_language, Instant::now())
            .await
    }

    async fn finish(
        &self,
        frame: Option<Frame>,
        caption: Caption,
        language: &str,
        started: Instant,
    ) -> PipelineOutcome {
        let mut warnings = Vec::new();

        let translated = self.translate(&caption, language, &mut warnings).await;
        let audio = self.speak(&translated, &mut warnings).await;

        let source_timestamp = caption.source_timestamp;
        let update = SessionUpdate {
            frame,
            caption: caption.clone(),
            translated: translated.clone(),
            audio: audio.clone(),
        };

        match self.state.apply_update(update, source_timestamp) {
            Ok(()) => {
                let elapsed = started.elapsed();
                tracing::info!(
                    timestamp_ms = source_timestamp.as_millis() as u64,
                    language,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "{}",
                    translated.text
                );
                PipelineOutcome::Published(RunReport {
                    caption,
                    translated,
                    audio,
                    warnings,
                    elapsed,
                })
            }
            Err(stale) => {
                self.error_reporter.report(stale.stage(), &stale);
                PipelineOutcome::Stale(stale)
            }
        }
    }

    async fn translate(
        &self,
        caption: &Caption,
        language: &str,
        warnings: &mut Vec<StageError>,
    ) -> TranslatedCaption {
        if language == self.config.default_language {
            return TranslatedCaption::new(caption.text.clone(), language);
        }

        let translated = with_timeout(
            "translation",
            self.config.translation_timeout,
            self.translator.translate(&caption.text, language),
        )
        .await;

        match translated {
            Ok(text) => TranslatedCaption::new(text, language),
            Err(e) => {
                let error = StageError::TranslationFailed {
                    language: language.to_string(),
                    reason: e.to_string(),
                };
                self.error_reporter.report(error.stage(), &error);
                warnings.push(error);
                TranslatedCaption::new(caption.text.clone(), language)
            }
        }
    }

    async fn speak(
        &self,
        translated: &TranslatedCaption,
        warnings: &mut Vec<StageError>,
    ) -> Option<Arc<AudioClip>> {
        let spoken = with_timeout(
            "speech synthesis",
            self.config.speech_timeout,
            self.synthesizer
                .synthesize(&translated.text, &translated.language),
        )
        .await;

        match spoken {
            Ok(clip) => Some(Arc::new(clip)),
            Err(e) => {
                let error = StageError::SpeechFailed {
                    language: translated.language.clone(),
                    reason: e.to_string(),
                };
                self.error_reporter.report(error.stage(), &error);
                warnings.push(error);
                None
            }
        }
    }
}

async fn with_timeout<T>(
    service: &'static str,
    limit: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| SightError::Timeout {
            service,
            after: limit,
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ImageData;
    use crate::pipeline::error::CollectingReporter;
    use crate::services::{MockCaptioner, MockSynthesizer, MockTranslator};

    fn frame_at(secs: u64) -> Frame {
        Frame::new(
            ImageData::new(vec![1, 2, 3], "image/png"),
            Duration::from_secs(secs),
            secs,
        )
    }

    struct Fixture {
        captioner: MockCaptioner,
        translator: MockTranslator,
        synthesizer: MockSynthesizer,
        reporter: Arc<CollectingReporter>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                captioner: MockCaptioner::new().with_response("a dog running on grass"),
                translator: MockTranslator::new()
                    .with_translation("hi", "घास पर दौड़ता हुआ कुत्ता"),
                synthesizer: MockSynthesizer::new(),
                reporter: Arc::new(CollectingReporter::new()),
            }
        }

        fn build(&self) -> Orchestrator {
            Orchestrator::new(
                Arc::new(self.captioner.clone()),
                Arc::new(self.translator.clone()),
                Arc::new(self.synthesizer.clone()),
                Arc::new(SessionState::new("en")),
                OrchestratorConfig::default(),
            )
            .with_error_reporter(self.reporter.clone())
        }
    }

    #[tokio::test]
    async fn test_default_language_skips_translator() {
        let fixture = Fixture::new();
        let orchestrator = fixture.build();

        let outcome = orchestrator.process(frame_at(0), "en").await;
        let report = outcome.report().unwrap();
        assert_eq!(report.translated.text, "a dog running on grass");
        assert_eq!(report.translated.language, "en");
        assert_eq!(fixture.translator.call_count(), 0);
        assert_eq!(
            fixture.synthesizer.requests(),
            vec![("a dog running on grass".to_string(), "en".to_string())]
        );
    }

    #[tokio::test]
    async fn test_selected_language_is_translated_and_spoken() {
        let fixture = Fixture::new();
        let orchestrator = fixture.build();

        let outcome = orchestrator.process(frame_at(0), "hi").await;
        assert!(outcome.is_published());

        let snapshot = orchestrator.state().snapshot();
        assert_eq!(
            snapshot.latest_caption.unwrap().text,
            "a dog running on grass"
        );
        assert_eq!(
            snapshot.latest_translated_caption.unwrap().text,
            "घास पर दौड़ता हुआ कुत्ता"
        );
        assert_eq!(
            fixture.synthesizer.requests(),
            vec![("घास पर दौड़ता हुआ कुत्ता".to_string(), "hi".to_string())]
        );
        assert!(snapshot.latest_audio.is_some());
    }

    #[tokio::test]
    async fn test_caption_failure_leaves_state_untouched() {
        let mut fixture = Fixture::new();
        fixture.captioner = MockCaptioner::new().with_failure();
        let orchestrator = fixture.build();

        let outcome = orchestrator.process(frame_at(0), "hi").await;
        match outcome {
            PipelineOutcome::CaptionFailed(error) => assert!(error.is_fatal()),
            other => panic!("Expected CaptionFailed, got {:?}", other),
        }
        assert_eq!(orchestrator.state().snapshot().revision, 0);
        assert_eq!(fixture.translator.call_count(), 0);
        assert_eq!(fixture.synthesizer.call_count(), 0);
        assert_eq!(fixture.reporter.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_translation_failure_falls_back_to_caption() {
        let mut fixture = Fixture::new();
        fixture.translator = MockTranslator::new().with_failure();
        let orchestrator = fixture.build();

        let outcome = orchestrator.process(frame_at(0), "ta").await;
        let report = outcome.report().unwrap();
        assert_eq!(report.translated.text, "a dog running on grass");
        assert_eq!(report.translated.language, "ta");
        assert!(matches!(
            report.warnings.as_slice(),
            [StageError::TranslationFailed { .. }]
        ));
        assert_eq!(
            fixture.synthesizer.requests(),
            vec![("a dog running on grass".to_string(), "ta".to_string())]
        );
        assert_eq!(fixture.reporter.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_speech_failure_publishes_without_audio() {
        let mut fixture = Fixture::new();
        fixture.synthesizer = MockSynthesizer::new().with_failure();
        let orchestrator = fixture.build();

        let outcome = orchestrator.process(frame_at(0), "hi").await;
        let report = outcome.report().unwrap();
        assert!(report.audio.is_none());
        assert!(matches!(
            report.warnings.as_slice(),
            [StageError::SpeechFailed { .. }]
        ));
        let snapshot = orchestrator.state().snapshot();
        assert!(snapshot.latest_caption.is_some());
        assert!(snapshot.latest_audio.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_captioner_times_out() {
        let mut fixture = Fixture::new();
        fixture.captioner = MockCaptioner::new().with_delay(Duration::from_secs(60));
        let orchestrator = fixture.build();

        match orchestrator.process(frame_at(0), "en").await {
            PipelineOutcome::CaptionFailed(StageError::CaptionFailed { reason }) => {
                assert_eq!(reason, "captioning timed out after 30000ms");
            }
            other => panic!("Expected CaptionFailed, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_translator_times_out_and_degrades() {
        let mut fixture = Fixture::new();
        fixture.translator = MockTranslator::new().with_delay(Duration::from_secs(60));
        let orchestrator = fixture.build();

        let outcome = orchestrator.process(frame_at(0), "hi").await;
        let report = outcome.report().unwrap();
        assert_eq!(report.translated.text, "a dog running on grass");
        assert_eq!(report.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_older_frame_is_stale_after_newer_publish() {
        let fixture = Fixture::new();
        let orchestrator = fixture.build();

        assert!(orchestrator.process(frame_at(4), "en").await.is_published());
        match orchestrator.process(frame_at(1), "en").await {
            PipelineOutcome::Stale(StageError::StaleResult {
                frame_timestamp,
                published_timestamp,
            }) => {
                assert_eq!(frame_timestamp, Duration::from_secs(1));
                assert_eq!(published_timestamp, Duration::from_secs(4));
            }
            other => panic!("Expected Stale, got {:?}", other),
        }
        let snapshot = orchestrator.state().snapshot();
        assert_eq!(snapshot.source_timestamp, Some(Duration::from_secs(4)));
    }

    #[tokio::test]
    async fn test_retranslate_keeps_frame_and_caption() {
        let fixture = Fixture::new();
        let orchestrator = fixture.build();
        orchestrator.process(frame_at(3), "en").await;
        let before = orchestrator.state().snapshot();
        let caption = before.latest_caption.clone().unwrap();

        let outcome = orchestrator.retranslate(&caption, "hi").await;
        assert!(outcome.is_published());
        assert_eq!(fixture.captioner.call_count(), 1);

        let after = orchestrator.state().snapshot();
        assert_eq!(after.latest_frame, before.latest_frame);
        assert_eq!(after.latest_caption, before.latest_caption);
        assert_eq!(
            after.latest_translated_caption.unwrap().text,
            "घास पर दौड़ता हुआ कुत्ता"
        );
    }

    #[tokio::test]
    async fn test_retranslate_is_idempotent() {
        let fixture = Fixture::new();
        let orchestrator = fixture.build();
        orchestrator.process(frame_at(0), "en").await;
        let caption = orchestrator.state().snapshot().latest_caption.unwrap();

        orchestrator.retranslate(&caption, "ta").await;
        let first = orchestrator.state().snapshot();
        orchestrator.retranslate(&caption, "ta").await;
        let second = orchestrator.state().snapshot();

        assert_eq!(
            first.latest_translated_caption,
            second.latest_translated_caption
        );
        assert_eq!(
            first.latest_audio.map(|a| a.bytes.clone()),
            second.latest_audio.map(|a| a.bytes.clone())
        );
    }
}
