//! Terminal dashboard rendering.
//!
//! Turns a [`DashboardSnapshot`] into plain text (or JSON) for the CLI.

use crate::history::hourly_deltas;
use crate::models::{HourlyLogEntry, LiveMention, Report, Source, TrendPoint};
use crate::poller::DashboardSnapshot;
use anyhow::Result;

const BAR_WIDTH: usize = 32;

/// Render the full dashboard.
pub fn render_dashboard(snapshot: &DashboardSnapshot, hashtag: &str) -> String {
    let mut output = String::new();

    output.push_str(&render_header(snapshot, hashtag));

    if let Some(ref error) = snapshot.error {
        output.push_str(&format!("⚠️  {}\n\n", error));
    }

    output.push_str(&render_stats(snapshot));

    match (&snapshot.report, snapshot.loading) {
        (None, true) => output.push_str("Scraping social sources...\n\n"),
        (None, false) => output.push_str("No report available yet.\n\n"),
        (Some(report), _) => {
            output.push_str(&render_summary(report));
            output.push_str(&render_trend(&report.trend_data, snapshot));
            output.push_str(&render_live_feed(report.live_mentions.as_deref()));
        }
    }

    output.push_str(&render_history(&snapshot.history_logs));

    if let Some(ref report) = snapshot.report {
        output.push_str(&render_sources(&report.sources));
    }

    output
}

/// Render the snapshot as pretty JSON.
pub fn render_json(snapshot: &DashboardSnapshot) -> Result<String> {
    serde_json::to_string_pretty(snapshot).map_err(Into::into)
}

fn render_header(snapshot: &DashboardSnapshot, hashtag: &str) -> String {
    let status = if snapshot.is_live {
        "🟢 Live Scrape Active"
    } else {
        "⚪ Offline"
    };
    let refreshing = if snapshot.loading { "  (refreshing...)" } else { "" };

    format!(
        "=== HashPulse: {} ===\n{} | period {}{}\n\n",
        hashtag, status, snapshot.period, refreshing
    )
}

fn render_stats(snapshot: &DashboardSnapshot) -> String {
    let stats = snapshot.report.as_ref().map(|r| &r.current_stats);
    let mut section = String::new();

    match stats {
        Some(stats) => {
            section.push_str(&format!(
                "Live Total Count: {} (+{}% hourly velocity)\n",
                format_count(stats.total_mentions),
                stats.growth_rate
            ));
            section.push_str(&format!(
                "Verified Reach:   {}\n",
                or_placeholder(&stats.estimated_reach, "---")
            ));
            section.push_str(&format!(
                "Sentiment Index:  {}\n",
                or_placeholder(&stats.average_sentiment, "Neutral")
            ));
        }
        None => {
            section.push_str("Live Total Count: ---\n");
            section.push_str("Verified Reach:   ---\n");
            section.push_str("Sentiment Index:  Neutral\n");
        }
    }
    section.push_str(&format!(
        "Hourly Logged:    {}\n\n",
        snapshot.history_logs.len()
    ));

    section
}

fn render_summary(report: &Report) -> String {
    let summary = or_placeholder(&report.summary, "No summary available.");
    format!("Movement Summary\n  \"{}\"\n\n", summary)
}

fn render_trend(points: &[TrendPoint], snapshot: &DashboardSnapshot) -> String {
    let mut section = format!("Mentions Velocity ({} window)\n", snapshot.period);

    if points.is_empty() {
        section.push_str("  No trend data.\n\n");
        return section;
    }

    let max = points.iter().map(|p| p.count).max().unwrap_or(0);
    let label_width = points.iter().map(|p| p.date.chars().count()).max().unwrap_or(0);

    for point in points {
        let filled = if max == 0 {
            0
        } else {
            ((point.count as f64 / max as f64) * BAR_WIDTH as f64).round() as usize
        };
        section.push_str(&format!(
            "  {:<width$} {:<bar$} {} ({:+.2})\n",
            point.date,
            "█".repeat(filled),
            format_count(point.count),
            point.sentiment,
            width = label_width,
            bar = BAR_WIDTH
        ));
    }
    section.push('\n');

    section
}

fn render_live_feed(mentions: Option<&[LiveMention]>) -> String {
    let mut section = String::from("Live Feed\n");

    match mentions {
        Some(mentions) if !mentions.is_empty() => {
            for mention in mentions {
                section.push_str(&format!(
                    "  {} {} · {}\n    {}\n",
                    mention.user, mention.handle, mention.timestamp, mention.text
                ));
            }
        }
        _ => section.push_str("  Waiting for incoming data stream...\n"),
    }
    section.push('\n');

    section
}

/// Render the hourly log, newest first.
pub fn render_history(logs: &[HourlyLogEntry]) -> String {
    let mut section = String::from("Hourly Log History\n");

    if logs.is_empty() {
        section.push_str("  Waiting for first hourly log...\n\n");
        return section;
    }

    let deltas = hourly_deltas(logs);
    for (i, entry) in logs.iter().enumerate().rev() {
        let when = entry
            .local_time()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| entry.timestamp.to_string());
        let delta = match i.checked_sub(1).map(|prev| deltas[prev]) {
            Some(d) => format!(" ({:+})", d),
            None => String::new(),
        };
        section.push_str(&format!(
            "  {}  {} posts{}\n",
            when,
            format_count(entry.count),
            delta
        ));
    }
    section.push('\n');

    section
}

fn render_sources(sources: &[Source]) -> String {
    if sources.is_empty() {
        return String::new();
    }

    let mut section = String::from("Analysis Grounding\n");
    for source in sources {
        section.push_str(&format!("  - {} <{}>\n", source.title, source.uri));
    }
    section.push('\n');

    section
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}

/// Format a count with thousands separators (48210 -> "48,210").
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HOUR_MS;
    use crate::models::Period;

    fn create_test_snapshot() -> DashboardSnapshot {
        let report: Report =
            serde_json::from_str(include_str!("../../fixtures/sample_report.json")).unwrap();
        DashboardSnapshot {
            report: Some(report),
            loading: false,
            error: None,
            history_logs: vec![
                HourlyLogEntry::new(0, 47000),
                HourlyLogEntry::new(HOUR_MS, 48210),
            ],
            period: Period::Last7d,
            is_live: true,
        }
    }

    fn empty_snapshot(loading: bool) -> DashboardSnapshot {
        DashboardSnapshot {
            report: None,
            loading,
            error: None,
            history_logs: vec![],
            period: Period::Last24h,
            is_live: false,
        }
    }

    #[test]
    fn test_render_dashboard() {
        let text = render_dashboard(&create_test_snapshot(), "#keep4o");

        assert!(text.contains("HashPulse: #keep4o"));
        assert!(text.contains("Live Scrape Active"));
        assert!(text.contains("48,210"));
        assert!(text.contains("2.1M"));
        assert!(text.contains("Hourly Logged:    2"));
        assert!(text.contains("mid-week spike"));
        assert!(text.contains("@ada"));
        assert!(text.contains("https://example.com/trends"));
        assert!(text.contains("(+1210)"));
    }

    #[test]
    fn test_render_placeholders() {
        let text = render_dashboard(&empty_snapshot(true), "#keep4o");
        assert!(text.contains("Offline"));
        assert!(text.contains("Live Total Count: ---"));
        assert!(text.contains("Sentiment Index:  Neutral"));
        assert!(text.contains("Scraping social sources..."));
        assert!(text.contains("Waiting for first hourly log..."));

        let idle = render_dashboard(&empty_snapshot(false), "#keep4o");
        assert!(idle.contains("No report available yet."));
    }

    #[test]
    fn test_render_error_keeps_report() {
        let mut snapshot = create_test_snapshot();
        snapshot.error = Some("Analysis interrupted. The scraper is retrying...".to_string());
        let text = render_dashboard(&snapshot, "#keep4o");

        assert!(text.contains("The scraper is retrying"));
        assert!(text.contains("48,210"));
    }

    #[test]
    fn test_history_newest_first() {
        let text = render_history(&create_test_snapshot().history_logs);
        let newest = text.find("48,210").unwrap();
        let oldest = text.find("47,000").unwrap();
        assert!(newest < oldest);
    }

    #[test]
    fn test_render_json() {
        let json = render_json(&create_test_snapshot()).unwrap();
        assert!(json.contains("\"historyLogs\""));
        assert!(json.contains("\"isLive\": true"));
        assert!(json.contains("\"period\": \"7d\""));
        assert!(json.contains("\"totalMentions\": 48210"));
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(48210), "48,210");
        assert_eq!(format_count(1234567), "1,234,567");
    }
}
