//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap, plus the
//! interactive commands accepted on stdin while the poller runs.

use crate::models::Period;
use clap::Parser;
use std::path::PathBuf;

/// HashPulse - live hashtag activity tracker
///
/// Polls an LLM analyzer for a hashtag's activity, renders the latest
/// report and keeps a rolling 48-hour log of hourly mention counts.
///
/// Examples:
///   hashpulse
///   hashpulse --hashtag rustlang --period 24h
///   hashpulse --once --format json
///   hashpulse --history
///   hashpulse --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Hashtag to track (leading '#' optional)
    #[arg(long, value_name = "TAG")]
    pub hashtag: Option<String>,

    /// Report window
    #[arg(short, long, value_name = "PERIOD")]
    pub period: Option<Period>,

    /// Disable background refreshes (fetch on start and on demand only)
    #[arg(long)]
    pub no_live: bool,

    /// Fetch one report, print it and exit
    #[arg(long, conflicts_with = "history")]
    pub once: bool,

    /// Print the stored hourly log and exit (no network)
    #[arg(long)]
    pub history: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Ollama model to use for analysis
    ///
    /// Can also be set via HASHPULSE_MODEL env var or .hashpulse.toml config.
    #[arg(short, long, env = "HASHPULSE_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Seconds between background refreshes
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Directory holding the hourly log
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Keep the hourly log in memory only
    #[arg(long)]
    pub ephemeral: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .hashpulse.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .hashpulse.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Plain text dashboard (default)
    #[default]
    Text,
    /// JSON snapshot
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref tag) = self.hashtag {
            if tag.trim().trim_start_matches('#').is_empty() {
                return Err("Hashtag must not be empty".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.interval == Some(0) {
            return Err("Interval must be at least 1 second".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

/// A command typed on stdin while the poller runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Refresh,
    SetPeriod(Period),
    SetLive(bool),
    History,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();

        let command = match (verb.to_lowercase().as_str(), arg) {
            ("r" | "refresh", None) => Command::Refresh,
            ("p" | "period", Some(p)) => Command::SetPeriod(p.parse()?),
            ("p" | "period", None) => return Err("Usage: period <24h|7d|30d>".to_string()),
            ("live", Some("on")) => Command::SetLive(true),
            ("live", Some("off")) => Command::SetLive(false),
            ("live", _) => return Err("Usage: live <on|off>".to_string()),
            ("h" | "history", None) => Command::History,
            ("?" | "help", None) => Command::Help,
            ("q" | "quit" | "exit", None) => Command::Quit,
            (other, _) => return Err(format!("Unknown command '{}' (type 'help')", other)),
        };

        Ok(Some(command))
    }
}

/// Help text for the interactive commands.
pub const COMMAND_HELP: &str = "Commands: r(efresh) | p(eriod) <24h|7d|30d> | live <on|off> | h(istory) | q(uit)";
