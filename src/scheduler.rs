// src/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::coordinator::{RunCoordinator, RunOutcome};

/// Fire `try_run_once` every `period`, first one period after start.
///
/// Each tick runs on its own task so a slow run never delays the clock; ticks
/// that land while a run is active come back `Skipped`.
pub fn spawn_run_scheduler(coordinator: Arc<RunCoordinator>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            tracing::info!(target_name = coordinator.target(), "running scheduled job");

            let coord = Arc::clone(&coordinator);
            tokio::spawn(async move {
                if let RunOutcome::Skipped = coord.try_run_once().await {
                    tracing::debug!("scheduled tick skipped");
                }
            });
        }
    })
}

/// Liveness line on its own clock. Touches no pipeline state.
pub fn spawn_heartbeat(period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started = Instant::now();
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            tracing::debug!(uptime_secs = started.elapsed().as_secs(), "relay is running");
        }
    })
}
