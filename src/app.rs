//! Application entry points.
//!
//! Wires configuration, the HTTP service adapters and a frame source into a
//! session: photo → describe → translate → speak.

use crate::config::Config;
use crate::error::{Result, SightError};
use crate::frame::{DirectorySource, PhotoSource};
use crate::output::{render_event, snapshot_json, write_audio};
use crate::pipeline::{Orchestrator, Session, SessionEvent, SessionState};
use crate::services::{
    Captioner, GoogleTtsSynthesizer, HttpCaptioner, HttpTranslator, SpeechSynthesizer, Translator,
};
use crossbeam_channel::RecvTimeoutError;
use std::io::{BufRead, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// The three external services a session talks to.
pub struct Services {
    pub captioner: Arc<dyn Captioner>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl Services {
    /// HTTP-backed services as configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeouts = config.orchestrator_config();
        let captioner = HttpCaptioner::new(
            &config.captioning.endpoint,
            config.captioning.api_key.clone(),
            timeouts.caption_timeout,
        )?;
        let translator = HttpTranslator::new(
            &config.translation.endpoint,
            &config.pipeline.default_language,
            config.translation.api_key.clone(),
            timeouts.translation_timeout,
        )?;
        let synthesizer = GoogleTtsSynthesizer::new(
            &config.speech.endpoint,
            &config.speech.client,
            timeouts.speech_timeout,
        )?;

        if config.captioning.api_key.is_none() {
            tracing::warn!("no captioning API key set; the hosted model may reject requests");
        }
        tracing::debug!(model = captioner.name(), "captioning service ready");

        Ok(Self {
            captioner: Arc::new(captioner),
            translator: Arc::new(translator),
            synthesizer: Arc::new(synthesizer),
        })
    }
}

/// Build a session speaking `language`, validated against the configured
/// catalog.
pub fn build_session(config: &Config, services: Services, language: &str) -> Result<Session> {
    let catalog = config.catalog()?;
    catalog.resolve(language)?;

    let state = Arc::new(SessionState::new(language));
    let orchestrator = Orchestrator::new(
        services.captioner,
        services.translator,
        services.synthesizer,
        state,
        config.orchestrator_config(),
    );

    Ok(Session::new(orchestrator)
        .with_catalog(catalog)
        .with_capture_interval(config.capture_interval()))
}

/// Run the describe command: one photo → description → speech.
///
/// # Arguments
/// * `config` - Effective configuration
/// * `photo` - Image file to describe
/// * `language` - Optional language override
/// * `audio_out` - Where to write the spoken description
/// * `json` - Print the result as JSON instead of text
/// * `quiet` - Suppress status messages
pub async fn run_describe_command(
    config: Config,
    photo: PathBuf,
    language: Option<String>,
    audio_out: Option<PathBuf>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    config.validate()?;
    let language = language.unwrap_or_else(|| config.pipeline.language.clone());
    let services = Services::from_config(&config)?;

    let (event_tx, event_rx) = crossbeam_channel::bounded(16);
    let session = build_session(&config, services, &language)?
        .with_event_sender(event_tx)
        .start();

    if !quiet && !json {
        eprintln!("Describing {}...", photo.display());
    }

    let mut source = PhotoSource::new(photo);
    session.run_source(&mut source).await?;

    let events: Vec<SessionEvent> = event_rx.try_iter().collect();
    let snapshot = session.snapshot();

    if snapshot.latest_caption.is_none() {
        let message = events
            .iter()
            .find_map(|event| match event {
                SessionEvent::RunFailed { message, .. } => Some(message.clone()),
                _ => None,
            })
            .unwrap_or_else(|| "no description was produced".to_string());
        return Err(SightError::Other(message));
    }

    if let Some(path) = &audio_out {
        match &snapshot.latest_audio {
            Some(audio) => {
                std::fs::write(path, &audio.bytes)?;
                if !quiet && !json {
                    eprintln!("Audio written to {}", path.display());
                }
            }
            None => tracing::warn!("no audio to write to {}", path.display()),
        }
    }

    if json {
        let rendered = serde_json::to_string_pretty(&snapshot_json(&snapshot))
            .map_err(|e| SightError::Other(format!("failed to encode result: {e}")))?;
        println!("{rendered}");
    } else {
        let color = std::io::stdout().is_terminal();
        for event in events
            .iter()
            .filter(|e| matches!(e, SessionEvent::CaptionReady { .. }))
        {
            render_event(event, color);
        }
    }

    Ok(())
}

/// Options for the watch command.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub dir: PathBuf,
    pub language: Option<String>,
    pub interval: Option<Duration>,
    pub frame_period: Option<Duration>,
    pub once: bool,
    pub audio_dir: Option<PathBuf>,
    pub json: bool,
}

/// Run the watch command: a directory replayed as a camera, described
/// continuously until the source ends or Ctrl+C.
///
/// When stdin is a terminal, typing a language code and Enter switches the
/// spoken language.
pub async fn run_watch_command(config: Config, options: WatchOptions, quiet: bool) -> Result<()> {
    config.validate()?;
    let language = options
        .language
        .clone()
        .unwrap_or_else(|| config.pipeline.language.clone());
    let interval = options.interval.unwrap_or_else(|| config.capture_interval());
    let frame_period = options.frame_period.unwrap_or_else(|| config.frame_period());
    if frame_period.is_zero() {
        return Err(SightError::ConfigInvalidValue {
            key: "frame_period".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    let mut source = DirectorySource::new(&options.dir, frame_period)?.with_once(options.once);
    let services = Services::from_config(&config)?;

    let (event_tx, event_rx) = crossbeam_channel::bounded(64);
    let session = build_session(&config, services, &language)?
        .with_capture_interval(interval)
        .with_event_sender(event_tx)
        .start();

    if !quiet {
        eprintln!(
            "Watching {} ({} frames, one description every {}), speaking {language}",
            options.dir.display(),
            source.len(),
            humantime::format_duration(interval)
        );
    }

    // Render events on a dedicated thread, like a presentation layer would.
    let running = Arc::new(AtomicBool::new(true));
    let render_running = running.clone();
    let state = session.state();
    let audio_dir = options.audio_dir.clone();
    let json = options.json;
    let color = std::io::stdout().is_terminal();
    let renderer = thread::spawn(move || {
        loop {
            match event_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(event) => present_event(&event, &state, audio_dir.as_deref(), json, color),
                Err(RecvTimeoutError::Timeout) => {
                    if !render_running.load(Ordering::SeqCst) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    });

    if std::io::stdin().is_terminal() {
        if !quiet {
            let codes: Vec<&str> = session
                .catalog()
                .languages()
                .iter()
                .map(|l| l.code.as_str())
                .collect();
            eprintln!("Type a language code and Enter to switch ({})", codes.join(", "));
        }
        // Blocking stdin reads get their own thread; it dies with the process.
        let input_session = session.clone();
        let runtime = tokio::runtime::Handle::current();
        thread::spawn(move || {
            let _runtime = runtime.enter();
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let code = line.trim();
                if code.is_empty() {
                    continue;
                }
                if let Err(e) = input_session.set_language(code) {
                    eprintln!("{e}");
                }
            }
        });
    }

    let outcome = tokio::select! {
        result = session.run_source(&mut source) => result.map(Some),
        _ = tokio::signal::ctrl_c() => Ok(None),
    };

    running.store(false, Ordering::SeqCst);
    if renderer.join().is_err() {
        tracing::error!("event renderer panicked");
    }

    if let Some(summary) = outcome?
        && !quiet
    {
        eprintln!(
            "Done: {} frames seen, {} described",
            summary.frames_seen, summary.frames_admitted
        );
    }
    Ok(())
}

fn present_event(
    event: &SessionEvent,
    state: &SessionState,
    audio_dir: Option<&Path>,
    json: bool,
    color: bool,
) {
    if json {
        match event.to_json() {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::error!("failed to encode event: {e}"),
        }
    } else {
        render_event(event, color);
    }

    if let (
        Some(dir),
        SessionEvent::CaptionReady {
            timestamp_ms,
            has_audio: true,
            ..
        },
    ) = (audio_dir, event)
    {
        let snapshot = state.snapshot();
        // A newer result may already have replaced this one.
        if snapshot.source_timestamp.map(|ts| ts.as_millis() as u64) != Some(*timestamp_ms) {
            return;
        }
        if let Some(audio) = &snapshot.latest_audio {
            match write_audio(dir, *timestamp_ms, audio) {
                Ok(path) => tracing::debug!("audio saved to {}", path.display()),
                Err(e) => tracing::warn!("failed to save audio: {e}"),
            }
        }
    }
}
