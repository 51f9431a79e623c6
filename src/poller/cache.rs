//! Most recent report plus fetch status.

use crate::models::Report;

/// Latest resolved report, visible-loading flag and advisory error.
///
/// Results are applied in the order fetches *resolve*, not the order they
/// were issued, so a slow older fetch can overwrite a newer one.
#[derive(Debug, Clone, Default)]
pub struct ReportCache {
    report: Option<Report>,
    visible_in_flight: usize,
    last_error: Option<String>,
    /// Sequence number of the fetch whose result was applied last.
    applied_seq: u64,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    /// True while a visible fetch is outstanding.
    pub fn loading(&self) -> bool {
        self.visible_in_flight > 0
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn begin_visible(&mut self) {
        self.visible_in_flight += 1;
    }

    pub(crate) fn end_visible(&mut self) {
        self.visible_in_flight = self.visible_in_flight.saturating_sub(1);
    }

    /// Replace the report. Returns true when a newer fetch had already been
    /// applied (out-of-order resolution).
    pub(crate) fn apply_success(&mut self, seq: u64, report: Report) -> bool {
        let out_of_order = seq < self.applied_seq;
        self.report = Some(report);
        self.last_error = None;
        self.applied_seq = seq;
        out_of_order
    }

    /// Record a failed fetch; the previous report is kept.
    pub(crate) fn apply_failure(&mut self, seq: u64, message: impl Into<String>) -> bool {
        let out_of_order = seq < self.applied_seq;
        self.last_error = Some(message.into());
        self.applied_seq = seq;
        out_of_order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CurrentStats;

    fn report(total: u64) -> Report {
        Report {
            current_stats: CurrentStats {
                total_mentions: total,
                ..CurrentStats::default()
            },
            trend_data: vec![],
            comparison_data: None,
            summary: format!("{} mentions", total),
            sources: vec![],
            live_mentions: None,
        }
    }

    #[test]
    fn test_failure_keeps_report() {
        let mut cache = ReportCache::new();
        cache.apply_success(1, report(10));
        cache.apply_failure(2, "boom");

        assert_eq!(cache.report().map(|r| r.total_mentions()), Some(10));
        assert_eq!(cache.last_error(), Some("boom"));

        cache.apply_success(3, report(20));
        assert_eq!(cache.last_error(), None);
        assert_eq!(cache.report().map(|r| r.total_mentions()), Some(20));
    }

    #[test]
    fn test_last_resolved_wins() {
        let mut cache = ReportCache::new();
        assert!(!cache.apply_success(2, report(200)));
        assert!(cache.apply_success(1, report(100)));

        assert_eq!(cache.report().map(|r| r.total_mentions()), Some(100));
        // A newer fetch resolving next is in order again.
        assert!(!cache.apply_success(3, report(300)));
    }

    #[test]
    fn test_loading_counts_visible_fetches() {
        let mut cache = ReportCache::new();
        assert!(!cache.loading());

        cache.begin_visible();
        cache.begin_visible();
        cache.end_visible();
        assert!(cache.loading());

        cache.end_visible();
        cache.end_visible();
        assert!(!cache.loading());
    }
}
