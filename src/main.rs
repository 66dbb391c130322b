//! Notice relay binary entrypoint.
//! Parses the CLI, loads configuration, and starts the periodic run and heartbeat tasks.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use notice_relay::config::RelayConfig;
use notice_relay::deliver::xdotool::XdoToolAutomation;
use notice_relay::scheduler::{spawn_heartbeat, spawn_run_scheduler};
use notice_relay::{metrics, HttpNoticeSource, RunCoordinator};

#[derive(Debug, Parser)]
#[command(name = "notice-relay", about = "Relay new notice board posts into a chat room")]
struct Cli {
    /// Chatroom name (exact title of the conversation window)
    #[arg(long)]
    chatroom: String,

    /// Echo start-up parameters
    #[arg(long)]
    verbose: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("notice_relay=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        println!("Chatroom name: {}", cli.chatroom);
    }

    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = RelayConfig::load_default().context("loading relay config")?;
    if let Some(addr) = cfg.metrics_addr {
        metrics::install_exporter(addr)?;
    }

    tracing::info!(
        target_name = %cli.chatroom,
        interval_secs = cfg.interval_secs,
        url = %cfg.listing_url,
        "relay is starting"
    );

    let coordinator = Arc::new(RunCoordinator::new(
        Box::new(HttpNoticeSource::new()),
        Box::new(XdoToolAutomation::new(cfg.host_window_title.clone())),
        cli.chatroom,
        cfg.run_settings(),
    ));

    let runs = spawn_run_scheduler(coordinator, cfg.interval());
    let heartbeat = spawn_heartbeat(cfg.heartbeat());

    tokio::select! {
        res = runs => res.context("run scheduler stopped")?,
        res = heartbeat => res.context("heartbeat stopped")?,
        res = tokio::signal::ctrl_c() => {
            res.context("listening for ctrl-c")?;
            tracing::info!("shutdown requested");
        }
    }

    Ok(())
}
