//! Data models for the hashtag tracker.
//!
//! This module contains the report shape returned by the analyzer, the
//! polling period, and the hourly log entries kept on disk.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Time window the analyzer reports on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Period {
    /// Last 24 hours
    #[serde(rename = "24h")]
    #[value(name = "24h")]
    Last24h,
    /// Last 7 days (default)
    #[default]
    #[serde(rename = "7d")]
    #[value(name = "7d")]
    Last7d,
    /// Last 30 days
    #[serde(rename = "30d")]
    #[value(name = "30d")]
    Last30d,
}

impl Period {
    /// All periods in display order.
    pub const ALL: [Period; 3] = [Period::Last24h, Period::Last7d, Period::Last30d];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Last24h => "24h",
            Period::Last7d => "7d",
            Period::Last30d => "30d",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "24h" => Ok(Period::Last24h),
            "7d" => Ok(Period::Last7d),
            "30d" => Ok(Period::Last30d),
            other => Err(format!(
                "Unknown period '{}' (expected 24h, 7d or 30d)",
                other
            )),
        }
    }
}

/// Headline numbers for the tracked hashtag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentStats {
    /// Total posts/mentions as of the analysis.
    #[serde(default, deserialize_with = "deserialize_count")]
    pub total_mentions: u64,
    /// Hourly growth, in percent.
    #[serde(default)]
    pub growth_rate: f64,
    /// Free-form sentiment label ("Positive", "Mixed", ...).
    #[serde(default)]
    pub average_sentiment: String,
    /// Free-form reach estimate ("1.2M", ...).
    #[serde(default)]
    pub estimated_reach: String,
}

/// One point of the trend series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: String,
    #[serde(deserialize_with = "deserialize_count")]
    pub count: u64,
    /// -1.0 (negative) to 1.0 (positive)
    pub sentiment: f64,
    #[serde(deserialize_with = "deserialize_count")]
    pub reach: u64,
}

/// Read a count written as any JSON number (`48210`, `48210.0`, `1.5e6`).
///
/// Fractions are rounded; negative and non-finite values are rejected.
fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.is_finite() && value >= 0.0 {
        Ok(value.round() as u64)
    } else {
        Err(serde::de::Error::custom(format!(
            "invalid count {}, expected a non-negative number",
            value
        )))
    }
}

/// Previous vs current comparison row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPoint {
    pub label: String,
    pub previous: f64,
    pub current: f64,
}

/// A grounding source accompanying the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default = "default_source_title")]
    pub title: String,
    #[serde(default = "default_source_uri")]
    pub uri: String,
}

fn default_source_title() -> String {
    "Source".to_string()
}

fn default_source_uri() -> String {
    "#".to_string()
}

/// A sample post from the live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveMention {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub timestamp: String,
}

/// A complete analysis snapshot. Replaced wholesale on every successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub current_stats: CurrentStats,
    pub trend_data: Vec<TrendPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_data: Option<Vec<ComparisonPoint>>,
    pub summary: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_mentions: Option<Vec<LiveMention>>,
}

impl Report {
    /// Total mentions reported by the analyzer.
    pub fn total_mentions(&self) -> u64 {
        self.current_stats.total_mentions
    }
}

/// One retained hourly sample of total mentions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyLogEntry {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub count: u64,
}

impl HourlyLogEntry {
    pub fn new(timestamp: i64, count: u64) -> Self {
        Self { timestamp, count }
    }

    /// The sample time as a local date-time, if the timestamp is in range.
    pub fn local_time(&self) -> Option<chrono::DateTime<chrono::Local>> {
        chrono::DateTime::from_timestamp_millis(self.timestamp)
            .map(|utc| utc.with_timezone(&chrono::Local))
    }
}

/// Ordered hourly log, oldest first. Serialized as a plain JSON array.
pub type LogSequence = Vec<HourlyLogEntry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_round_trips_through_text() {
        for period in Period::ALL {
            assert_eq!(period.as_str().parse::<Period>(), Ok(period));
            let json = serde_json::to_string(&period).unwrap();
            assert_eq!(json, format!("\"{}\"", period));
        }
        assert!("1y".parse::<Period>().is_err());
        assert_eq!(" 24H ".parse::<Period>(), Ok(Period::Last24h));
    }

    #[test]
    fn test_default_period() {
        assert_eq!(Period::default(), Period::Last7d);
    }

    #[test]
    fn test_report_parses_provider_shape() {
        let json = include_str!("../fixtures/sample_report.json");
        let report: Report = serde_json::from_str(json).unwrap();

        assert_eq!(report.total_mentions(), 48210);
        assert_eq!(report.current_stats.average_sentiment, "Positive");
        assert_eq!(report.trend_data.len(), 4);
        assert_eq!(report.live_mentions.as_ref().map(|m| m.len()), Some(2));
        assert_eq!(report.sources.len(), 2);
        assert!(report.comparison_data.is_none());
    }

    #[test]
    fn test_counts_accept_any_json_number() {
        let point: TrendPoint = serde_json::from_str(
            r#"{"date": "Mon", "count": 1200.0, "sentiment": 0.4, "reach": 1.5e6}"#,
        )
        .unwrap();
        assert_eq!(point.count, 1200);
        assert_eq!(point.reach, 1_500_000);

        let stats: CurrentStats = serde_json::from_str(r#"{"totalMentions": 48209.6}"#).unwrap();
        assert_eq!(stats.total_mentions, 48210);
    }

    #[test]
    fn test_counts_reject_negative_numbers() {
        assert!(serde_json::from_str::<CurrentStats>(r#"{"totalMentions": -3}"#).is_err());
        assert!(serde_json::from_str::<TrendPoint>(
            r#"{"date": "Mon", "count": 1, "sentiment": 0.0, "reach": -1.0}"#
        )
        .is_err());
    }

    #[test]
    fn test_source_defaults() {
        let source: Source = serde_json::from_str("{}").unwrap();
        assert_eq!(source.title, "Source");
        assert_eq!(source.uri, "#");
    }

    #[test]
    fn test_report_requires_summary() {
        let json = r#"{"currentStats": {"totalMentions": 1}, "trendData": []}"#;
        assert!(serde_json::from_str::<Report>(json).is_err());
    }

    #[test]
    fn test_log_entry_wire_format() {
        let logs: LogSequence = vec![HourlyLogEntry::new(0, 100)];
        let json = serde_json::to_string(&logs).unwrap();
        assert_eq!(json, r#"[{"timestamp":0,"count":100}]"#);
    }
}
