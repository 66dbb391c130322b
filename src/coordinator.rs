// src/coordinator.rs
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tokio::sync::Mutex;

use crate::change_detector::{detect_new, Watermark};
use crate::deliver::automation::{ChatAutomation, SettleDelays};
use crate::deliver::{DeliveryDriver, DeliveryReport};
use crate::source::parser::parse_notices;
use crate::source::NoticeSource;

/// Terminal result of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The board could not be fetched; retried on the next trigger.
    NoData,
    /// Nothing above the watermark.
    UpToDate,
    Delivered { sent: usize },
    /// The conversation could not be opened. Nothing was sent, but the
    /// entries count as seen.
    OpenFailed { dropped: usize },
    PartialDelivery {
        sent: Vec<u64>,
        failed: Vec<u64>,
        cleanup_failed: bool,
    },
    /// Delivery exceeded its time budget and was abandoned mid-sequence.
    /// A bounded cleanup of the host is attempted before returning.
    TimedOut,
    /// Another run was active; this trigger was dropped.
    Skipped,
}

impl RunOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::NoData => "no_data",
            RunOutcome::UpToDate => "up_to_date",
            RunOutcome::Delivered { .. } => "delivered",
            RunOutcome::OpenFailed { .. } => "open_failed",
            RunOutcome::PartialDelivery { .. } => "partial_delivery",
            RunOutcome::TimedOut => "timed_out",
            RunOutcome::Skipped => "skipped",
        }
    }

    fn from_report(report: DeliveryReport, pending: usize) -> Self {
        if !report.opened() {
            return RunOutcome::OpenFailed { dropped: pending };
        }
        if report.is_complete() {
            return RunOutcome::Delivered {
                sent: report.sent.len(),
            };
        }
        RunOutcome::PartialDelivery {
            sent: report.sent,
            failed: report.failed,
            cleanup_failed: report.clean_error.is_some(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub listing_url: String,
    pub view_base_url: String,
    pub delays: SettleDelays,
    /// `None` lets a stuck automation step block the run indefinitely.
    pub delivery_timeout: Option<Duration>,
}

/// Single entry point per trigger: fetch → parse → detect → deliver.
///
/// Owns the only watermark. Runs are serialized on it, so two runs can never
/// race on the clipboard or on the watermark.
pub struct RunCoordinator {
    source: Box<dyn NoticeSource>,
    automation: Box<dyn ChatAutomation>,
    target: String,
    settings: RunSettings,
    watermark: Mutex<Watermark>,
}

impl RunCoordinator {
    pub fn new(
        source: Box<dyn NoticeSource>,
        automation: Box<dyn ChatAutomation>,
        target: impl Into<String>,
        settings: RunSettings,
    ) -> Self {
        Self {
            source,
            automation,
            target: target.into(),
            settings,
            watermark: Mutex::new(Watermark::default()),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Current watermark; waits for an active run to finish.
    pub async fn watermark(&self) -> Watermark {
        *self.watermark.lock().await
    }

    /// Run now, queued behind any run already in progress.
    pub async fn run_once(&self) -> RunOutcome {
        let mut watermark = self.watermark.lock().await;
        self.run_locked(&mut watermark).await
    }

    /// Run now unless a run is already in progress, in which case `Skipped`.
    pub async fn try_run_once(&self) -> RunOutcome {
        match self.watermark.try_lock() {
            Ok(mut watermark) => self.run_locked(&mut watermark).await,
            Err(_) => {
                tracing::warn!(
                    target_name = %self.target,
                    "previous run still active; trigger skipped"
                );
                counter!("relay_runs_total", "outcome" => RunOutcome::Skipped.label())
                    .increment(1);
                RunOutcome::Skipped
            }
        }
    }

    async fn run_locked(&self, watermark: &mut Watermark) -> RunOutcome {
        crate::metrics::ensure_metrics_described();
        let t0 = Instant::now();

        let outcome = self.pipeline(watermark).await;

        histogram!("relay_run_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("relay_runs_total", "outcome" => outcome.label()).increment(1);
        tracing::info!(
            outcome = outcome.label(),
            watermark = watermark.last_seen_id(),
            "run completed"
        );
        outcome
    }

    async fn pipeline(&self, watermark: &mut Watermark) -> RunOutcome {
        let url = &self.settings.listing_url;
        tracing::info!(url = %url, source = self.source.name(), "fetching notice board");

        let markup = match self.source.fetch(url).await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "notice board fetch failed");
                return RunOutcome::NoData;
            }
        };

        let entries = parse_notices(&markup, &self.settings.view_base_url);
        let (fresh, advanced) = detect_new(entries, *watermark);
        if fresh.is_empty() {
            tracing::info!(target_name = %self.target, "no new notices");
            return RunOutcome::UpToDate;
        }

        // Advances before delivery: entries from a failed delivery are not retried.
        *watermark = advanced;
        tracing::info!(
            count = fresh.len(),
            watermark = advanced.last_seen_id(),
            "new notices found"
        );

        let pending = fresh.len();
        let mut driver = DeliveryDriver::new(self.automation.as_ref(), &self.settings.delays);

        let Some(limit) = self.settings.delivery_timeout else {
            let report = driver.deliver(&self.target, &fresh).await;
            return RunOutcome::from_report(report, pending);
        };

        let delivered = tokio::time::timeout(limit, driver.deliver(&self.target, &fresh)).await;
        match delivered {
            Ok(report) => RunOutcome::from_report(report, pending),
            Err(_) => {
                tracing::error!(
                    timeout_secs = limit.as_secs(),
                    "delivery timed out; remaining notices dropped"
                );
                // The abandoned pass may have left the conversation open.
                if tokio::time::timeout(limit, driver.recover()).await.is_err() {
                    tracing::error!("host cleanup after timeout did not finish");
                }
                RunOutcome::TimedOut
            }
        }
    }
}
