use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use sightspeak::app::{WatchOptions, run_describe_command, run_watch_command};
use sightspeak::cli::{Cli, Commands, ConfigAction};
use sightspeak::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);
    tracing::debug!(version = %sightspeak::version_string(), "starting");

    match cli.command {
        Commands::Describe {
            photo,
            language,
            audio_out,
            json,
        } => {
            let config = load_config(cli.config.as_deref())?;
            run_describe_command(config, photo, language, audio_out, json, cli.quiet).await?;
        }
        Commands::Watch {
            dir,
            language,
            interval,
            frame_period,
            once,
            audio_dir,
            json,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let options = WatchOptions {
                dir,
                language,
                interval,
                frame_period,
                once,
                audio_dir,
                json,
            };
            run_watch_command(config, options, cli.quiet).await?;
        }
        Commands::Languages => {
            let config = load_config(cli.config.as_deref())?;
            list_languages(&config)?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "sightspeak",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Initialize `tracing` output on stderr.
///
/// `RUST_LOG` takes precedence over `-q`/`-v`.
fn init_logging(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/sightspeak/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        // Load from custom path
        Config::load(path)?
    } else {
        // Try default path, fall back to defaults
        Config::load_or_default(&Config::default_path())?
    };

    // Apply environment variable overrides
    Ok(config.with_env_overrides())
}

/// List selectable languages, marking the default and the selected one.
fn list_languages(config: &Config) -> Result<()> {
    let catalog = config.catalog()?;
    println!("Languages (selected: {}):", config.pipeline.language.green());
    for language in catalog.languages() {
        let marker = if language.code == config.pipeline.language {
            "●".green().to_string()
        } else {
            " ".to_string()
        };
        let default = if catalog.is_default(&language.code) {
            format!(" {}", "(captions)".dimmed())
        } else {
            String::new()
        };
        println!("  {marker} {:<4}{}{default}", language.code, language.name);
    }
    Ok(())
}

/// Handle configuration commands.
fn handle_config_command(
    action: ConfigAction,
    custom_path: Option<&std::path::Path>,
) -> Result<()> {
    let config_path = custom_path
        .map(std::path::PathBuf::from)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Path => {
            let note = if config_path.exists() {
                String::new()
            } else {
                format!(" {}", "(not created, using defaults)".dimmed())
            };
            println!("{}{note}", config_path.display());
        }
        ConfigAction::Show => {
            let config = Config::load_or_default(&config_path)?.with_env_overrides();
            if let Err(e) = config.validate() {
                eprintln!("{}", format!("Warning: {e}").yellow());
            }
            print!("{}", toml::to_string_pretty(&config.redacted())?);
        }
    }
    Ok(())
}
