//! Command-line interface for sightspeak
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Spoken scene descriptions from a camera
#[derive(Parser, Debug)]
#[command(
    name = "sightspeak",
    version,
    about = "Spoken scene descriptions from a camera"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: stage timings, -vv: full diagnostics)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a duration such as `3s`, `500ms` or `1m`.
///
/// Bare numbers are seconds.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Describe a single photo and speak the description
    Describe {
        /// Image file (PNG or JPEG)
        photo: PathBuf,

        /// Language to speak (default: from config)
        #[arg(long, short = 'l', value_name = "LANG")]
        language: Option<String>,

        /// Write the spoken description to this file
        #[arg(long, value_name = "FILE")]
        audio_out: Option<PathBuf>,

        /// Print the result as JSON (audio embedded as a data: URL)
        #[arg(long)]
        json: bool,
    },

    /// Treat a directory of images as a camera and describe it continuously
    Watch {
        /// Directory of PNG/JPEG frames, replayed in name order
        dir: PathBuf,

        /// Language to speak (default: from config)
        #[arg(long, short = 'l', value_name = "LANG")]
        language: Option<String>,

        /// Minimum time between descriptions (default: from config). Examples: 3s, 500ms
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        interval: Option<Duration>,

        /// Time between replayed frames (default: from config)
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        frame_period: Option<Duration>,

        /// Stop after one pass over the directory
        #[arg(long)]
        once: bool,

        /// Save each spoken description into this directory
        #[arg(long, value_name = "DIR")]
        audio_dir: Option<PathBuf>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// List selectable languages
    Languages,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration inspection actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the configuration file location
    Path,
    /// Print the effective configuration (API keys masked)
    Show,
}
