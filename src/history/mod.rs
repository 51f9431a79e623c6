//! Hourly mention log: aggregation and persistence.

pub mod aggregator;
pub mod store;

pub use aggregator::{hourly_deltas, HourlyAggregator};
pub use store::{FileStore, KeyValueStore, MemoryStore, PersistentLogStore, DEFAULT_STORAGE_KEY};

/// Minimum spacing between logged samples, in milliseconds.
pub const HOUR_MS: i64 = 3_600_000;

/// Rolling window size: two days of hourly samples.
pub const MAX_LOG_ENTRIES: usize = 48;
