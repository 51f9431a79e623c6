//! Polling: fetch scheduling and the latest-report cache.

pub mod cache;
pub mod scheduler;

pub use scheduler::{DashboardSnapshot, PollScheduler};
