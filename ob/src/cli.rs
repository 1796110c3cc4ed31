//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// opbridge - build operation notification bridge
#[derive(Parser)]
#[command(
    name = "ob",
    about = "Replay build operation event logs through the notification bridge",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play an event log through a bridge and print the notifications
    Replay {
        /// JSONL event log
        file: PathBuf,

        /// Events emitted before the bridge attaches (replayed from the source buffer)
        #[arg(short, long)]
        attach_after: Option<usize>,

        /// Print progress notifications
        #[arg(short, long)]
        progress: bool,

        /// Output format
        #[arg(short, long)]
        format: Option<OutputFormat>,
    },

    /// Check an event log for per-operation ordering violations
    Check {
        /// JSONL event log
        file: PathBuf,
    },
}

/// Output format for printed notifications
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
