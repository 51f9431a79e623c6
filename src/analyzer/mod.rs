//! Hashtag analysis providers.
//!
//! The poller only depends on the [`Analyzer`] trait; [`OllamaAnalyzer`] is
//! the LLM-backed implementation used by the binary.

pub mod ollama;

pub use ollama::{OllamaAnalyzer, OllamaConfig};

use crate::models::{Period, Report};
use async_trait::async_trait;
use thiserror::Error;

/// Analyzer errors
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to Ollama at {0}")]
    Connect(String),

    #[error("Failed to send request: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ollama API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Malformed analysis response: {0}")]
    Malformed(String),
}

/// Produces a fresh report for a time window.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, period: Period) -> Result<Report, AnalyzerError>;
}
