//! Terminal rendering of session events and files written for the user.

use crate::error::Result;
use crate::pipeline::{AudioClip, SessionEvent, SessionSnapshot};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

/// Format an event for the terminal. `color` adds ANSI styling.
pub fn format_event(event: &SessionEvent, color: bool) -> String {
    match event {
        SessionEvent::CaptionReady {
            timestamp_ms,
            caption,
            translated,
            language,
            has_audio,
            warnings,
        } => {
            let time = format_timestamp(*timestamp_ms);
            let mut line = if color {
                format!("{} {}", time.dimmed(), translated.bold())
            } else {
                format!("{time} {translated}")
            };

            let mut details = vec![language.clone()];
            if translated != caption {
                details.push(format!("\"{caption}\""));
            }
            if !has_audio {
                details.push("no audio".to_string());
            }
            let details = format!(" [{}]", details.join(", "));
            if color {
                line.push_str(&details.dimmed().to_string());
            } else {
                line.push_str(&details);
            }

            for warning in warnings {
                line.push('\n');
                let warning = format!("  warning: {warning}");
                if color {
                    line.push_str(&warning.yellow().to_string());
                } else {
                    line.push_str(&warning);
                }
            }
            line
        }
        SessionEvent::RunFailed {
            timestamp_ms,
            message,
        } => {
            let line = format!("{} {message}", format_timestamp(*timestamp_ms));
            if color {
                line.red().to_string()
            } else {
                line
            }
        }
        SessionEvent::LanguageChanged { language } => {
            if color {
                format!("Language: {}", language.green())
            } else {
                format!("Language: {language}")
            }
        }
    }
}

/// Render an event: descriptions to stdout, everything else to stderr.
pub fn render_event(event: &SessionEvent, color: bool) {
    let text = format_event(event, color);
    match event {
        SessionEvent::CaptionReady { .. } => println!("{text}"),
        _ => eprintln!("{text}"),
    }
}

/// `mm:ss.d` offset into the session.
fn format_timestamp(timestamp_ms: u64) -> String {
    let minutes = timestamp_ms / 60_000;
    let seconds = (timestamp_ms % 60_000) / 1000;
    let tenths = (timestamp_ms % 1000) / 100;
    format!("{minutes:02}:{seconds:02}.{tenths}")
}

/// File name for the clip spoken for the frame at `timestamp_ms`.
pub fn audio_file_name(timestamp_ms: u64, clip: &AudioClip) -> String {
    format!("caption-{timestamp_ms:08}.{}", clip.extension())
}

/// Save `clip` into `dir`, creating the directory if needed.
pub fn write_audio(dir: &Path, timestamp_ms: u64, clip: &AudioClip) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(audio_file_name(timestamp_ms, clip));
    std::fs::write(&path, &clip.bytes)?;
    Ok(path)
}

/// JSON view of a snapshot, audio embedded as a `data:` URL.
pub fn snapshot_json(snapshot: &SessionSnapshot) -> serde_json::Value {
    serde_json::json!({
        "language": snapshot.selected_language,
        "timestamp_ms": snapshot.source_timestamp.map(|ts| ts.as_millis() as u64),
        "caption": snapshot.latest_caption.as_ref().map(|c| c.text.clone()),
        "translated": snapshot
            .latest_translated_caption
            .as_ref()
            .map(|t| t.text.clone()),
        "audio": snapshot.latest_audio.as_ref().map(|a| a.to_data_url()),
    })
}
