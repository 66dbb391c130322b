// src/config.rs
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::coordinator::RunSettings;
use crate::deliver::automation::SettleDelays;
use crate::notice::{DEFAULT_LISTING_URL, DEFAULT_VIEW_BASE_URL};

pub const ENV_CONFIG_PATH: &str = "RELAY_CONFIG_PATH";
const DEFAULT_TOML_PATH: &str = "config/relay.toml";
const DEFAULT_JSON_PATH: &str = "config/relay.json";

const DEFAULT_INTERVAL_SECS: u64 = 900;
const DEFAULT_HEARTBEAT_SECS: u64 = 900;
const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 300;
const DEFAULT_HOST_WINDOW_TITLE: &str = "카카오톡";

/// Operational settings. The delivery target itself comes from the CLI.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub listing_url: String,
    pub view_base_url: String,
    pub interval_secs: u64,
    pub heartbeat_secs: u64,
    /// 0 disables the delivery timeout.
    pub delivery_timeout_secs: u64,
    /// Title of the chat client's main window (holds the conversation search box).
    pub host_window_title: String,
    pub metrics_addr: Option<SocketAddr>,
    pub settle: SettleDelays,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            view_base_url: DEFAULT_VIEW_BASE_URL.to_string(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            heartbeat_secs: DEFAULT_HEARTBEAT_SECS,
            delivery_timeout_secs: DEFAULT_DELIVERY_TIMEOUT_SECS,
            host_window_title: DEFAULT_HOST_WINDOW_TITLE.to_string(),
            metrics_addr: None,
            settle: SettleDelays::default(),
        }
    }
}

impl RelayConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading relay config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing relay config {}", path.display()))
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $RELAY_CONFIG_PATH
    /// 2) config/relay.toml
    /// 3) config/relay.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_TOML_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_TOML_PATH))?
        } else if Path::new(DEFAULT_JSON_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_JSON_PATH))?
        } else {
            Self::default()
        };

        cfg.apply_env();
        cfg.sanitize();
        Ok(cfg)
    }

    /// Override single fields from `RELAY_*` variables. Unparsable values are ignored.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("RELAY_LISTING_URL") {
            self.listing_url = v;
        }
        if let Ok(v) = std::env::var("RELAY_VIEW_BASE_URL") {
            self.view_base_url = v;
        }
        if let Ok(v) = std::env::var("RELAY_HOST_WINDOW_TITLE") {
            self.host_window_title = v;
        }
        if let Some(v) = env_parse("RELAY_INTERVAL_SECS") {
            self.interval_secs = v;
        }
        if let Some(v) = env_parse("RELAY_DELIVERY_TIMEOUT_SECS") {
            self.delivery_timeout_secs = v;
        }
        if let Some(v) = env_parse("RELAY_METRICS_ADDR") {
            self.metrics_addr = Some(v);
        }
    }

    fn sanitize(&mut self) {
        if self.interval_secs == 0 {
            tracing::warn!("interval_secs must be positive; using {DEFAULT_INTERVAL_SECS}");
            self.interval_secs = DEFAULT_INTERVAL_SECS;
        }
        if self.heartbeat_secs == 0 {
            tracing::warn!("heartbeat_secs must be positive; using {DEFAULT_HEARTBEAT_SECS}");
            self.heartbeat_secs = DEFAULT_HEARTBEAT_SECS;
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            listing_url: self.listing_url.clone(),
            view_base_url: self.view_base_url.clone(),
            delays: self.settle.clone(),
            delivery_timeout: (self.delivery_timeout_secs > 0)
                .then(|| Duration::from_secs(self.delivery_timeout_secs)),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable env override");
            None
        }
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<RelayConfig> {
    match hint_ext {
        "json" => serde_json::from_str(s).context("relay config is not valid JSON"),
        "toml" => toml::from_str(s).context("relay config is not valid TOML"),
        _ => toml::from_str(s)
            .or_else(|_| serde_json::from_str(s))
            .map_err(|_| anyhow!("unsupported relay config format")),
    }
}
