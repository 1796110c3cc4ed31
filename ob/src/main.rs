//! opbridge - build operation notification bridge
//!
//! CLI entry point for replaying and checking recorded operation event logs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use opbridge::cli::{Cli, Command, OutputFormat};
use opbridge::config::Config;
use opbridge::observer::{ConsoleObserver, ObserverRegistrar};
use opbridge::source::{ListenerHub, OperationSource, check_ordering, read_event_log};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("opbridge")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("ob.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Replay {
            file,
            attach_after,
            progress,
            format,
        } => {
            let attach_after = attach_after.unwrap_or(config.replay.attach_after);
            let progress = progress || config.observer.progress;
            let format = format.unwrap_or(config.observer.format);
            cmd_replay(&file, attach_after, progress, format)
        }
        Command::Check { file } => cmd_check(&file),
    }
}

fn cmd_replay(file: &Path, attach_after: usize, progress: bool, format: OutputFormat) -> Result<()> {
    let events = read_event_log(file)?;
    let split = attach_after.min(events.len());
    info!(events = events.len(), attach_after = split, "cmd_replay: starting");

    let hub = Arc::new(ListenerHub::new());
    let source: Arc<dyn OperationSource> = hub.clone();

    let registrar = Arc::new(ObserverRegistrar::new());
    registrar.register(Arc::new(ConsoleObserver::stdout(format, progress)));

    let (before, after) = events.split_at(split);
    for event in before {
        event.dispatch(hub.as_ref())?;
    }

    let attachment = opbridge::attach(&source, registrar).context("Failed to attach bridge")?;

    for event in after {
        event.dispatch(hub.as_ref())?;
    }

    let stats = attachment.engine().stats();
    eprintln!(
        "{} {} replayed, {} started, {} progress, {} finished, {} delivery failures",
        "Summary:".bold(),
        attachment.replayed(),
        stats.started,
        stats.progress,
        stats.finished,
        stats.delivery_failures
    );
    if attachment.is_detached() {
        eprintln!("{} bridge detached after root operation finished", "✓".green());
    } else {
        eprintln!("{} root operation never finished, bridge still attached", "!".yellow());
    }
    Ok(())
}

fn cmd_check(file: &Path) -> Result<()> {
    let events = read_event_log(file)?;
    let violations = check_ordering(&events);

    if violations.is_empty() {
        println!("{} {} events, no ordering violations", "✓".green(), events.len());
        return Ok(());
    }

    for violation in &violations {
        println!("{} {}", "✗".red(), violation);
    }
    Err(eyre::eyre!("{} ordering violations in {}", violations.len(), file.display()))
}
