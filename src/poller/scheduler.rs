//! Fetch scheduling.
//!
//! A [`PollScheduler`] issues one visible fetch whenever it is started or its
//! period changes, then (while live) a silent fetch on every poll interval.
//! Fetches run as their own tasks: cancelling the timer only stops future
//! ticks, and a fetch that is already in flight still lands in the cache.

use super::cache::ReportCache;
use crate::analyzer::Analyzer;
use crate::history::HourlyAggregator;
use crate::models::{LogSequence, Period, Report};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Time between silent background fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Advisory shown while the previous report is kept after a failed fetch.
pub const FETCH_ERROR_MESSAGE: &str = "Analysis interrupted. The scraper is retrying...";

/// How a fetch is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Toggles the loading indicator.
    Visible,
    /// Background refresh; the last report stays on screen.
    Silent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Fetching,
    FetchingSilent,
}

/// Read-only view handed to presentation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub report: Option<Report>,
    pub loading: bool,
    pub error: Option<String>,
    pub history_logs: LogSequence,
    pub period: Period,
    pub is_live: bool,
}

/// State shared between the scheduler, its timer and in-flight fetches.
struct Shared {
    analyzer: Arc<dyn Analyzer>,
    cache: Mutex<ReportCache>,
    history: Mutex<HourlyAggregator>,
    next_seq: AtomicU64,
    silent_in_flight: AtomicBool,
    updates: watch::Sender<u64>,
}

impl Shared {
    fn cache(&self) -> MutexGuard<'_, ReportCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn history(&self) -> MutexGuard<'_, HourlyAggregator> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn notify(&self) {
        self.updates.send_modify(|version| *version += 1);
    }
}

/// In-flight bookkeeping for one fetch, released on drop so a panicking
/// analyzer cannot leave `loading` or the silent flag stuck.
struct InFlight {
    shared: Arc<Shared>,
    mode: FetchMode,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        match self.mode {
            FetchMode::Visible => self.shared.cache().end_visible(),
            FetchMode::Silent => self.shared.silent_in_flight.store(false, Ordering::SeqCst),
        }
        self.shared.notify();
    }
}

/// Run one fetch to completion and apply its result.
async fn run_fetch(shared: Arc<Shared>, period: Period, mode: FetchMode, seq: u64) {
    let in_flight = InFlight {
        shared: shared.clone(),
        mode,
    };

    debug!("Fetch #{} started ({:?}, {})", seq, mode, period);
    let result = shared.analyzer.analyze(period).await;

    let observed = {
        let mut cache = shared.cache();
        let (out_of_order, observed) = match result {
            Ok(report) => {
                let total = report.total_mentions();
                (cache.apply_success(seq, report), Some(total))
            }
            Err(e) => {
                warn!("Fetch #{} failed: {}", seq, e);
                (cache.apply_failure(seq, FETCH_ERROR_MESSAGE), None)
            }
        };
        if out_of_order {
            debug!("Fetch #{} resolved after a newer fetch; applying anyway", seq);
        }
        observed
    };

    if let Some(total) = observed {
        shared.history().observe(total, Utc::now().timestamp_millis());
    }

    debug!("Fetch #{} applied", seq);
    drop(in_flight);
}

/// Handle to the recurring silent-fetch task.
struct PollTimer {
    cancel: CancellationToken,
    #[allow(dead_code)] // Detached; cancellation goes through the token
    handle: JoinHandle<()>,
}

/// Drives visible and silent fetches against an [`Analyzer`].
pub struct PollScheduler {
    shared: Arc<Shared>,
    period: Period,
    is_live: bool,
    interval: Duration,
    started: bool,
    timer: Option<PollTimer>,
}

impl PollScheduler {
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        history: HourlyAggregator,
        period: Period,
        is_live: bool,
    ) -> Self {
        let (updates, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                analyzer,
                cache: Mutex::new(ReportCache::new()),
                history: Mutex::new(history),
                next_seq: AtomicU64::new(0),
                silent_in_flight: AtomicBool::new(false),
                updates,
            }),
            period,
            is_live,
            interval: DEFAULT_POLL_INTERVAL,
            started: false,
            timer: None,
        }
    }

    /// Override the silent-fetch interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Begin scheduling: one visible fetch now, then the timer if live.
    pub fn start(&mut self) -> JoinHandle<()> {
        info!(
            "Starting poller (period {}, live {}, every {}s)",
            self.period,
            self.is_live,
            self.interval.as_secs()
        );
        self.started = true;
        self.reschedule()
    }

    /// Stop the timer. In-flight fetches still complete.
    pub fn stop(&mut self) {
        if self.started {
            info!("Stopping poller");
        }
        self.started = false;
        self.cancel_timer();
    }

    /// Change the period. Reschedules (with a visible fetch) if running.
    pub fn set_period(&mut self, period: Period) -> Option<JoinHandle<()>> {
        self.reconfigure(period, self.is_live)
    }

    /// Toggle live polling. Turning it on reschedules like a fresh start;
    /// turning it off only cancels the timer.
    pub fn set_live(&mut self, is_live: bool) -> Option<JoinHandle<()>> {
        self.reconfigure(self.period, is_live)
    }

    /// Apply a period and live setting together, rescheduling at most once.
    pub fn reconfigure(&mut self, period: Period, is_live: bool) -> Option<JoinHandle<()>> {
        let period_changed = period != self.period;
        let went_live = is_live && !self.is_live;
        let went_offline = !is_live && self.is_live;

        self.period = period;
        self.is_live = is_live;

        if !self.started {
            return None;
        }

        if period_changed || went_live {
            info!("Rescheduling (period {}, live {})", period, is_live);
            Some(self.reschedule())
        } else {
            if went_offline {
                info!("Live polling disabled");
                self.cancel_timer();
            }
            None
        }
    }

    /// Issue one visible fetch now, without touching the timer.
    pub fn refresh_now(&self) -> JoinHandle<()> {
        self.spawn_visible()
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn is_live(&self) -> bool {
        self.is_live
    }

    pub fn is_timer_armed(&self) -> bool {
        self.timer.is_some()
    }

    pub fn state(&self) -> SchedulerState {
        if self.shared.cache().loading() {
            SchedulerState::Fetching
        } else if self.shared.silent_in_flight.load(Ordering::SeqCst) {
            SchedulerState::FetchingSilent
        } else {
            SchedulerState::Idle
        }
    }

    /// Receiver that changes whenever the cache or history is updated.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.updates.subscribe()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let (report, loading, error) = {
            let cache = self.shared.cache();
            (
                cache.report().cloned(),
                cache.loading(),
                cache.last_error().map(String::from),
            )
        };

        DashboardSnapshot {
            report,
            loading,
            error,
            history_logs: self.shared.history().logs().clone(),
            period: self.period,
            is_live: self.is_live,
        }
    }

    fn reschedule(&mut self) -> JoinHandle<()> {
        self.cancel_timer();
        let handle = self.spawn_visible();
        if self.is_live {
            self.arm_timer();
        }
        handle
    }

    fn spawn_visible(&self) -> JoinHandle<()> {
        let seq = self.shared.next_seq();
        self.shared.cache().begin_visible();
        self.shared.notify();
        tokio::spawn(run_fetch(
            self.shared.clone(),
            self.period,
            FetchMode::Visible,
            seq,
        ))
    }

    fn arm_timer(&mut self) {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let shared = self.shared.clone();
        let period = self.period;
        let every = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!("Poll timer cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        if shared.silent_in_flight.swap(true, Ordering::SeqCst) {
                            debug!("Silent fetch still in flight, skipping tick");
                            continue;
                        }
                        let seq = shared.next_seq();
                        tokio::spawn(run_fetch(shared.clone(), period, FetchMode::Silent, seq));
                    }
                }
            }
        });

        debug!("Poll timer armed ({}s)", every.as_secs());
        self.timer = Some(PollTimer { cancel, handle });
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel.cancel();
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
