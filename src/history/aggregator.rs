//! Hourly mention-count aggregation.
//!
//! Polling happens every few minutes, but the log keeps at most one sample
//! per hour and only the most recent [`MAX_LOG_ENTRIES`] samples.

use super::store::PersistentLogStore;
use super::{HOUR_MS, MAX_LOG_ENTRIES};
use crate::models::{HourlyLogEntry, LogSequence};
use tracing::{debug, info};

/// Owns the in-memory hourly log and writes it through to storage.
pub struct HourlyAggregator {
    logs: LogSequence,
    store: PersistentLogStore,
}

impl HourlyAggregator {
    /// Create an aggregator seeded from whatever the store holds.
    pub fn load(store: PersistentLogStore) -> Self {
        let logs = store.load();
        info!(
            "Loaded {} hourly log entries from '{}'",
            logs.len(),
            store.key()
        );
        Self { logs, store }
    }

    /// Record a mention count observed at `now` (ms since epoch).
    ///
    /// Appends only when the log is empty or the last entry is at least an
    /// hour old. Zero counts are never logged.
    pub fn observe(&mut self, current_count: u64, now: i64) -> &LogSequence {
        if current_count == 0 {
            debug!("Ignoring zero mention count");
            return &self.logs;
        }

        if let Some(last) = self.logs.last() {
            if now - last.timestamp < HOUR_MS {
                return &self.logs;
            }
        }

        self.logs.push(HourlyLogEntry::new(now, current_count));
        if self.logs.len() > MAX_LOG_ENTRIES {
            let excess = self.logs.len() - MAX_LOG_ENTRIES;
            self.logs.drain(..excess);
        }

        debug!(
            "Logged {} mentions at {} ({} entries)",
            current_count,
            now,
            self.logs.len()
        );
        self.store.save(&self.logs);
        &self.logs
    }

    pub fn logs(&self) -> &LogSequence {
        &self.logs
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    pub fn latest(&self) -> Option<&HourlyLogEntry> {
        self.logs.last()
    }
}

/// Count change between each entry and the one before it.
///
/// The result has one element fewer than `logs`.
pub fn hourly_deltas(logs: &[HourlyLogEntry]) -> Vec<i64> {
    logs.windows(2)
        .map(|pair| pair[1].count as i64 - pair[0].count as i64)
        .collect()
}
