// src/metrics.rs
use std::net::SocketAddr;

use anyhow::Context;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics before the first run).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("relay_runs_total", "Completed runs, labelled by outcome.");
        describe_counter!(
            "relay_fetch_errors_total",
            "Notice board fetches that failed (status or transport)."
        );
        describe_counter!(
            "relay_notices_parsed_total",
            "Notice entries parsed from the board."
        );
        describe_counter!(
            "relay_parse_errors_total",
            "Announcement blocks skipped because they could not be parsed."
        );
        describe_counter!(
            "relay_new_notices_total",
            "Entries above the watermark at detection time."
        );
        describe_counter!(
            "relay_messages_sent_total",
            "Messages pasted and confirmed in the conversation."
        );
        describe_counter!(
            "relay_messages_failed_total",
            "Messages whose send sequence failed."
        );
        describe_gauge!("relay_watermark", "Highest notice id already processed.");
        describe_histogram!("relay_run_ms", "Wall time of one run in milliseconds.");
    });
}

/// Install the Prometheus recorder with its own HTTP listener on `addr`.
pub fn install_exporter(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("installing prometheus exporter on {addr}"))?;
    ensure_metrics_described();
    Ok(())
}
