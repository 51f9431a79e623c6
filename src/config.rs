//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.hashpulse.toml` files.

use crate::history::DEFAULT_STORAGE_KEY;
use crate::models::Period;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".hashpulse.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Polling settings.
    #[serde(default)]
    pub poll: PollConfig,

    /// History storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Hashtag to track, including the leading '#'.
    #[serde(default = "default_hashtag")]
    pub hashtag: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            hashtag: default_hashtag(),
            verbose: false,
        }
    }
}

fn default_hashtag() -> String {
    "#keep4o".to_string()
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Default model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout() -> u64 {
    120
}

/// Polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Report window.
    #[serde(default)]
    pub period: Period,

    /// Keep refreshing in the background.
    #[serde(default = "default_true")]
    pub live: bool,

    /// Seconds between background refreshes.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            period: Period::default(),
            live: true,
            interval_seconds: default_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    300
}

/// History storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the history file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Key (file stem) the hourly log is stored under.
    #[serde(default = "default_key")]
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            key: default_key(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".hashpulse")
}

fn default_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only explicitly provided values override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref hashtag) = args.hashtag {
            self.general.hashtag = normalize_hashtag(hashtag);
        }
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }

        if let Some(period) = args.period {
            self.poll.period = period;
        }
        if args.no_live {
            self.poll.live = false;
        }
        if let Some(interval) = args.interval {
            self.poll.interval_seconds = interval;
        }

        if let Some(ref dir) = args.data_dir {
            self.storage.data_dir = dir.clone();
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check values the CLI cannot catch (they may come from the file).
    pub fn validate(&self) -> Result<()> {
        if self.poll.interval_seconds == 0 {
            bail!("poll.interval_seconds must be at least 1");
        }
        if self.model.timeout_seconds == 0 {
            bail!("model.timeout_seconds must be at least 1");
        }
        if self.general.hashtag.trim_start_matches('#').trim().is_empty() {
            bail!("general.hashtag must not be empty");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

/// Ensure the hashtag carries exactly one leading '#'.
pub fn normalize_hashtag(tag: &str) -> String {
    format!("#{}", tag.trim().trim_start_matches('#'))
}
