//! End-to-end session scenarios with mock services.

use sightspeak::frame::{Frame, ImageData, MockFrameSource, PhotoSource};
use sightspeak::pipeline::{
    CollectingReporter, FrameDisposition, Orchestrator, OrchestratorConfig, PipelineOutcome,
    Session, SessionEvent, SessionHandle, SessionState, StageError,
};
use sightspeak::services::{MockCaptioner, MockSynthesizer, MockTranslator};
use std::sync::Arc;
use std::time::Duration;

const DOG: &str = "a dog running on grass";
const DOG_HI: &str = "घास पर दौड़ता हुआ कुत्ता";

struct Harness {
    captioner: MockCaptioner,
    translator: MockTranslator,
    synthesizer: MockSynthesizer,
}

impl Harness {
    fn new() -> Self {
        Self {
            captioner: MockCaptioner::new().with_response(DOG),
            translator: MockTranslator::new().with_translation("hi", DOG_HI),
            synthesizer: MockSynthesizer::new(),
        }
    }

    fn orchestrator(&self, state: Arc<SessionState>) -> Orchestrator {
        Orchestrator::new(
            Arc::new(self.captioner.clone()),
            Arc::new(self.translator.clone()),
            Arc::new(self.synthesizer.clone()),
            state,
            OrchestratorConfig::default(),
        )
    }

    fn start(&self, language: &str) -> SessionHandle {
        let state = Arc::new(SessionState::new(language));
        Session::new(self.orchestrator(state)).start()
    }
}

fn frame_at(secs: u64) -> Frame {
    Frame::new(
        ImageData::new(format!("frame-{secs}").into_bytes(), "image/png"),
        Duration::from_secs(secs),
        secs,
    )
}

#[tokio::test]
async fn english_photo_is_described_and_spoken_untranslated() {
    let harness = Harness::new();
    let dir = tempfile::TempDir::new().unwrap();
    let photo = dir.path().join("dog.png");
    let png = ImageData::from_rgb(4, 4, vec![90u8; 48]).unwrap();
    std::fs::write(&photo, &png.bytes).unwrap();

    let session = harness.start("en");
    let mut source = PhotoSource::new(&photo);
    let summary = session.run_source(&mut source).await.unwrap();
    assert_eq!(summary.frames_admitted, 1);

    let snapshot = session.snapshot();
    assert_eq!(snapshot.latest_caption.unwrap().text, DOG);
    let translated = snapshot.latest_translated_caption.unwrap();
    assert_eq!(translated.text, DOG);
    assert_eq!(translated.language, "en");
    assert_eq!(
        snapshot.latest_audio.unwrap().bytes,
        format!("en:{DOG}").into_bytes()
    );
    assert_eq!(
        snapshot.latest_frame.unwrap().image.dimensions,
        Some((4, 4))
    );
    assert_eq!(harness.translator.call_count(), 0);
}

#[tokio::test]
async fn hindi_selection_translates_then_speaks_in_hindi() {
    let harness = Harness::new();
    let session = harness.start("hi");

    session.submit_frame(frame_at(0));
    session.wait_idle().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.latest_caption.unwrap().text, DOG);
    assert_eq!(snapshot.latest_translated_caption.unwrap().text, DOG_HI);
    assert_eq!(
        harness.synthesizer.requests(),
        vec![(DOG_HI.to_string(), "hi".to_string())]
    );
}

#[tokio::test]
async fn frames_inside_capture_interval_are_dropped() {
    let harness = Harness::new();
    let session = harness.start("en");

    assert_eq!(session.submit_frame(frame_at(0)), FrameDisposition::Started);
    session.wait_idle().await;
    assert_eq!(session.submit_frame(frame_at(1)), FrameDisposition::Dropped);
    assert_eq!(session.submit_frame(frame_at(4)), FrameDisposition::Started);
    session.wait_idle().await;

    assert_eq!(harness.captioner.call_count(), 2);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.source_timestamp, Some(Duration::from_secs(4)));
    assert_eq!(snapshot.latest_frame.unwrap().sequence, 4);
    assert_eq!(snapshot.revision, 2);
}

#[tokio::test(start_paused = true)]
async fn older_frame_finishing_last_does_not_overwrite_newer() {
    let state = Arc::new(SessionState::new("en"));
    let reporter = Arc::new(CollectingReporter::new());

    let slow = Harness {
        captioner: MockCaptioner::new()
            .with_response("old scene")
            .with_delay(Duration::from_secs(5)),
        ..Harness::new()
    }
    .orchestrator(state.clone())
    .with_error_reporter(reporter.clone());
    let fast = Harness {
        captioner: MockCaptioner::new().with_response("new scene"),
        ..Harness::new()
    }
    .orchestrator(state.clone());

    let (old, new) = tokio::join!(slow.process(frame_at(1), "en"), fast.process(frame_at(4), "en"));

    assert!(new.is_published());
    assert!(matches!(
        old,
        PipelineOutcome::Stale(StageError::StaleResult { .. })
    ));
    let snapshot = state.snapshot();
    assert_eq!(snapshot.latest_caption.unwrap().text, "new scene");
    assert_eq!(snapshot.source_timestamp, Some(Duration::from_secs(4)));
    assert_eq!(reporter.errors().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn newer_frame_finishing_last_is_published() {
    let state = Arc::new(SessionState::new("en"));
    let fast = Harness {
        captioner: MockCaptioner::new().with_response("old scene"),
        ..Harness::new()
    }
    .orchestrator(state.clone());
    let slow = Harness {
        captioner: MockCaptioner::new()
            .with_response("new scene")
            .with_delay(Duration::from_secs(5)),
        ..Harness::new()
    }
    .orchestrator(state.clone());

    let (old, new) = tokio::join!(fast.process(frame_at(1), "en"), slow.process(frame_at(4), "en"));

    assert!(old.is_published());
    assert!(new.is_published());
    let snapshot = state.snapshot();
    assert_eq!(snapshot.latest_caption.unwrap().text, "new scene");
    assert_eq!(snapshot.revision, 2);
}

#[tokio::test]
async fn translation_outage_speaks_the_original_caption() {
    let harness = Harness {
        translator: MockTranslator::new().with_failure(),
        ..Harness::new()
    };
    let (tx, rx) = crossbeam_channel::bounded(16);
    let state = Arc::new(SessionState::new("ta"));
    let session = Session::new(harness.orchestrator(state))
        .with_capture_interval(Duration::ZERO)
        .with_event_sender(tx)
        .start();

    let mut source = MockFrameSource::new(vec![
        Duration::from_secs(0),
        Duration::from_secs(3),
        Duration::from_secs(6),
    ]);
    session.run_source(&mut source).await.unwrap();

    let snapshot = session.snapshot();
    assert_eq!(
        snapshot.latest_translated_caption.unwrap().text,
        snapshot.latest_caption.unwrap().text
    );
    assert!(snapshot.latest_audio.is_some());

    let events: Vec<SessionEvent> = rx.try_iter().collect();
    assert!(!events.is_empty());
    for event in events {
        match event {
            SessionEvent::CaptionReady { warnings, .. } => {
                assert_eq!(warnings.len(), 1);
                assert!(warnings[0].contains("translation to 'ta' failed"));
            }
            other => panic!("Expected CaptionReady, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn speech_outage_publishes_captions_without_audio() {
    let harness = Harness {
        synthesizer: MockSynthesizer::new().with_failure(),
        ..Harness::new()
    };
    let session = harness.start("hi");

    session.submit_frame(frame_at(0));
    session.wait_idle().await;
    session.submit_frame(frame_at(3));
    session.wait_idle().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.latest_caption.unwrap().text, DOG);
    assert_eq!(snapshot.latest_translated_caption.unwrap().text, DOG_HI);
    assert!(snapshot.latest_audio.is_none());
    assert_eq!(snapshot.revision, 2);
}

#[tokio::test]
async fn language_switch_retranslates_without_recaptioning() {
    let harness = Harness::new();
    let session = harness.start("en");

    session.submit_frame(frame_at(0));
    session.wait_idle().await;
    let before = session.snapshot();

    session.set_language("hi").unwrap();
    session.wait_idle().await;
    let first = session.snapshot();

    // Switching away and back yields the same result
    session.set_language("ta").unwrap();
    session.wait_idle().await;
    session.set_language("hi").unwrap();
    session.wait_idle().await;
    let second = session.snapshot();

    assert_eq!(harness.captioner.call_count(), 1);
    assert_eq!(first.latest_frame, before.latest_frame);
    assert_eq!(second.latest_frame, before.latest_frame);
    assert_eq!(first.latest_caption, second.latest_caption);
    assert_eq!(
        first.latest_translated_caption,
        second.latest_translated_caption
    );
    assert_eq!(
        first.latest_audio.map(|a| a.bytes.clone()),
        second.latest_audio.map(|a| a.bytes.clone())
    );
}

#[tokio::test(start_paused = true)]
async fn language_change_during_run_is_applied_afterwards() {
    let harness = Harness {
        captioner: MockCaptioner::new()
            .with_response(DOG)
            .with_delay(Duration::from_secs(2)),
        ..Harness::new()
    };
    let session = harness.start("en");

    session.submit_frame(frame_at(0));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(session.is_busy());
    session.set_language("hi").unwrap();
    session.wait_idle().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.selected_language, "hi");
    assert_eq!(snapshot.latest_translated_caption.unwrap().text, DOG_HI);
    // The in-flight run finished in English, then one re-translation
    assert_eq!(harness.captioner.call_count(), 1);
    assert_eq!(harness.translator.call_count(), 1);
    assert_eq!(snapshot.revision, 2);
}

#[tokio::test]
async fn caption_outage_keeps_previous_description() {
    let harness = Harness::new();
    let session = harness.start("en");
    session.submit_frame(frame_at(0));
    session.wait_idle().await;

    let failing = Harness {
        captioner: MockCaptioner::new().with_failure(),
        ..Harness::new()
    };
    let state = session.state();
    let outcome = failing.orchestrator(state.clone()).process(frame_at(3), "en").await;

    assert!(matches!(outcome, PipelineOutcome::CaptionFailed(_)));
    let snapshot = state.snapshot();
    assert_eq!(snapshot.latest_caption.unwrap().text, DOG);
    assert_eq!(snapshot.source_timestamp, Some(Duration::ZERO));
}
