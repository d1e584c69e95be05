//! Liveness sweeper: periodically times out peers that stopped pinging.
//!
//! Start and stop are idempotent. Missed ticks are skipped, not replayed:
//! each sweep only looks at current state, so a late sweep costs at most one
//! extra period of staleness.

use std::sync::Mutex;
use std::time::Duration;

use bluem_core::config::TrackingConfig;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::tracker::PingTracker;

pub struct LivenessSweeper {
    tracker: PingTracker,
    period: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LivenessSweeper {
    /// A zero `period` falls back to the default sweep interval.
    pub fn new(tracker: PingTracker, period: Duration) -> Self {
        let period = if period.is_zero() {
            let fallback = TrackingConfig::default().sweep_interval();
            tracing::warn!(fallback_ms = fallback.as_millis() as u64, "zero sweep period");
            fallback
        } else {
            period
        };
        Self {
            tracker,
            period,
            task: Mutex::new(None),
        }
    }

    /// Schedule sweeping. Must be called from within a tokio runtime.
    /// Returns false if it was already scheduled.
    pub fn start(&self) -> bool {
        let mut task = self.task.lock().unwrap_or_else(|p| p.into_inner());
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }
        let tracker = self.tracker.clone();
        let period = self.period;
        *task = Some(tokio::spawn(sweep_loop(tracker, period)));
        tracing::info!(period_ms = period.as_millis() as u64, "liveness sweeper started");
        true
    }

    /// Cancel sweeping. Returns false if it was not scheduled.
    pub fn stop(&self) -> bool {
        let mut task = self.task.lock().unwrap_or_else(|p| p.into_inner());
        match task.take() {
            Some(handle) => {
                handle.abort();
                tracing::info!("liveness sweeper stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }
}

impl Drop for LivenessSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sweep every `period`, first one `period` after start.
async fn sweep_loop(tracker: PingTracker, period: Duration) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        tracker.sweep(Instant::now());
    }
}
