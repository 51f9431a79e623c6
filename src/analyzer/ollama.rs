//! Ollama-backed hashtag analyzer.
//!
//! Sends one non-streaming chat request per analysis and asks the model for
//! a JSON report matching [`Report`].

use super::{Analyzer, AnalyzerError};
use crate::models::{Period, Report};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for the analyzer.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Hashtag to analyze, including the leading '#'.
    pub hashtag: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            temperature: 0.2,
            timeout_seconds: 120,
            hashtag: "#keep4o".to_string(),
        }
    }
}

/// Message in the chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// Analyzer that asks a local Ollama model for the report.
pub struct OllamaAnalyzer {
    config: OllamaConfig,
    http_client: reqwest::Client,
}

impl OllamaAnalyzer {
    pub fn new(config: OllamaConfig) -> Result<Self, AnalyzerError> {
        info!(
            "Initializing analyzer with model {} for {}",
            config.model_name, config.hashtag
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Send the prompt and return the raw message content.
    async fn send_prompt(&self, prompt: &str) -> Result<String, AnalyzerError> {
        let url = format!("{}/api/chat", self.config.ollama_url.trim_end_matches('/'));

        let request = OllamaChatRequest {
            model: self.config.model_name.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalyzerError::Timeout(self.config.timeout_seconds)
                } else if e.is_connect() {
                    AnalyzerError::Connect(self.config.ollama_url.clone())
                } else {
                    AnalyzerError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Api { status, body });
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| AnalyzerError::Malformed(format!("Failed to parse Ollama response: {}", e)))?;

        Ok(chat_response.message.content)
    }
}

#[async_trait]
impl Analyzer for OllamaAnalyzer {
    async fn analyze(&self, period: Period) -> Result<Report, AnalyzerError> {
        let prompt = build_prompt(&self.config.hashtag, period);
        debug!("Requesting {} analysis for {}", period, self.config.hashtag);

        let content = self.send_prompt(&prompt).await?;
        let report = parse_report(&content)?;

        debug!(
            "Received report: {} mentions, {} trend points, {} sources",
            report.total_mentions(),
            report.trend_data.len(),
            report.sources.len()
        );
        Ok(report)
    }
}

/// Build the user prompt for one analysis.
fn build_prompt(hashtag: &str, period: Period) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!(
        "Perform a real-time analysis of X (formerly Twitter) for the hashtag \"{}\".\n",
        hashtag
    ));
    prompt.push_str("1. Estimate the current total number of posts/mentions as of this moment.\n");
    prompt.push_str(
        "2. Provide 5 recent sample posts (include id, user, handle, text and timestamp).\n",
    );
    prompt.push_str(&format!(
        "3. Provide a detailed report for the period: {}.\n\n",
        period
    ));
    prompt.push_str("Respond with a single JSON object with these fields:\n");
    prompt.push_str(r#"- "currentStats": {"totalMentions": number, "growthRate": number (percent), "averageSentiment": string, "estimatedReach": string}"#);
    prompt.push('\n');
    prompt.push_str(r#"- "trendData": array of {"date": string, "count": number, "sentiment": number between -1 and 1, "reach": number}, broken into smaller intervals of the period"#);
    prompt.push('\n');
    prompt.push_str(r#"- "liveMentions": array of 5 {"id", "user", "handle", "text", "timestamp"} strings"#);
    prompt.push('\n');
    prompt.push_str(r#"- "summary": string describing the current movement status"#);
    prompt.push('\n');
    prompt.push_str(r#"- "sources": optional array of {"title": string, "uri": string} you relied on"#);
    prompt.push('\n');
    prompt
}

/// Parse the model output into a report.
///
/// Tolerates a surrounding markdown code fence.
fn parse_report(content: &str) -> Result<Report, AnalyzerError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    if body.is_empty() {
        return Err(AnalyzerError::Malformed("empty response".to_string()));
    }

    serde_json::from_str(body).map_err(|e| AnalyzerError::Malformed(e.to_string()))
}

/// System prompt for the analysis request
const SYSTEM_PROMPT: &str = r#"You are a social media analyst tracking hashtag activity.
Answer with valid JSON only, no explanations or markdown.
Use numbers for numeric fields and strings for text fields."#;

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;

    #[test]
    fn test_config_default() {
        let config = OllamaConfig::default();
        assert_eq!(config.model_name, "llama3.2:latest");
        assert_eq!(config.hashtag, "#keep4o");
    }

    #[test]
    fn test_prompt_mentions_hashtag_and_period() {
        let prompt = build_prompt("#rustlang", Period::Last24h);
        assert!(prompt.contains("\"#rustlang\""));
        assert!(prompt.contains("period: 24h"));
        assert!(prompt.contains("currentStats"));
        assert!(prompt.contains("trendData"));
    }

    #[test]
    fn test_parse_report() {
        let report = parse_report(include_str!("../../fixtures/sample_report.json")).unwrap();
        assert_eq!(report.total_mentions(), 48210);
    }

    #[test]
    fn test_parse_fenced_report() {
        let fenced = format!(
            "```json\n{}\n```",
            include_str!("../../fixtures/sample_report.json")
        );
        let report = parse_report(&fenced).unwrap();
        assert_eq!(report.trend_data.len(), 4);
    }

    #[test]
    fn test_parse_minimal_report() {
        let report = parse_report(
            r#"{"currentStats": {"totalMentions": 12}, "trendData": [], "summary": "quiet"}"#,
        )
        .unwrap();
        assert_eq!(report.total_mentions(), 12);
        assert!(report.sources.is_empty());
        assert!(report.live_mentions.is_none());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(parse_report(""), Err(AnalyzerError::Malformed(_))));
        assert!(matches!(
            parse_report("The hashtag is trending!"),
            Err(AnalyzerError::Malformed(_))
        ));
        assert!(matches!(
            parse_report(r#"{"summary": "missing stats"}"#),
            Err(AnalyzerError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_float_counts() {
        let report = parse_report(
            r#"{"currentStats": {"totalMentions": 48210.0}, "trendData": [], "summary": "s"}"#,
        )
        .unwrap();
        assert_eq!(report.total_mentions(), 48210);

        let report = parse_report(
            r#"{
                "currentStats": {"totalMentions": 4.821e4},
                "trendData": [{"date": "Mon", "count": 9e2, "sentiment": 0.1, "reach": 1.5e6}],
                "summary": "s"
            }"#,
        )
        .unwrap();
        assert_eq!(report.total_mentions(), 48210);
        assert_eq!(report.trend_data[0].count, 900);
        assert_eq!(report.trend_data[0].reach, 1_500_000);
    }

    /// Analyzer pointed at `url`, bypassing any system proxy.
    fn local_analyzer(url: String) -> OllamaAnalyzer {
        OllamaAnalyzer {
            config: OllamaConfig {
                ollama_url: url,
                timeout_seconds: 5,
                ..OllamaConfig::default()
            },
            http_client: reqwest::Client::builder()
                .no_proxy()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap(),
        }
    }

    /// Answer the first request on a local port with `status` and `body`.
    async fn serve_once(status: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Drain the request so the client sees a clean response.
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let headers = String::from_utf8_lossy(&request[..end]).to_lowercase();
                    let length = headers
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_analyze_against_local_server() {
        let content = include_str!("../../fixtures/sample_report.json");
        let body = serde_json::json!({
            "model": "llama3.2:latest",
            "message": {"role": "assistant", "content": content},
            "done": true
        })
        .to_string();
        let analyzer = local_analyzer(serve_once("200 OK", body).await);

        let report = assert_ok!(analyzer.analyze(Period::Last24h).await);
        assert_eq!(report.total_mentions(), 48210);
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let body = r#"{"error":"model not found"}"#.to_string();
        let analyzer = local_analyzer(serve_once("404 Not Found", body).await);

        match analyzer.analyze(Period::Last7d).await {
            Err(AnalyzerError::Api { status, body }) => {
                assert_eq!(status, 404);
                assert!(body.contains("model not found"));
            }
            other => panic!("expected an API error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        // Bind then release a port so nothing is listening on it.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let url = format!("http://{}", addr);
        let analyzer = local_analyzer(url.clone());

        let result = analyzer.analyze(Period::Last7d).await;
        assert!(
            matches!(&result, Err(AnalyzerError::Connect(target)) if *target == url),
            "expected a connect error, got {:?}",
            result.map(|_| ())
        );
    }
}
