// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// Runtime configuration is read from the environment (and `.env` via dotenvy in main).

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::poller::PollerSettings;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    pub service_name: String,
    pub version: String,
    pub database_url: Option<String>,
    pub dashboard_dir: PathBuf,
    pub agent_timeout: Duration,
    pub poller: PollerSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let http_addr: SocketAddr = lookup("HTTP_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .context("invalid HTTP_ADDR")?;

        let service_name = lookup("SERVICE_NAME").unwrap_or_else(|| "netdash".into());
        let version =
            lookup("SERVICE_VERSION").unwrap_or_else(|| env!("CARGO_PKG_VERSION").into());

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let dashboard_dir = lookup("DASHBOARD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("dashboard/dist"));

        let agent_timeout_secs: u64 = parse_or(&lookup, "AGENT_TIMEOUT_SECS", 10)?;
        let interval_secs: u64 = parse_or(&lookup, "REFRESH_INTERVAL_SECS", 10)?;
        let points: u32 = parse_or(&lookup, "POLL_POINTS", 30)?;
        let bootstrap_window_secs: i64 = parse_or(&lookup, "BOOTSTRAP_WINDOW_SECS", 300)?;
        let dimension_index: usize = parse_or(&lookup, "DIMENSION_INDEX", 2)?;

        if interval_secs == 0 {
            bail!("REFRESH_INTERVAL_SECS must be greater than zero");
        }
        if points == 0 {
            bail!("POLL_POINTS must be greater than zero");
        }
        if bootstrap_window_secs <= 0 {
            bail!("BOOTSTRAP_WINDOW_SECS must be greater than zero");
        }
        // index 0 is the row timestamp
        if dimension_index == 0 {
            bail!("DIMENSION_INDEX must be at least 1");
        }

        Ok(Self {
            http_addr,
            service_name,
            version,
            database_url,
            dashboard_dir,
            agent_timeout: Duration::from_secs(agent_timeout_secs),
            poller: PollerSettings {
                interval: Duration::from_secs(interval_secs),
                points,
                bootstrap_window_secs,
                dimension_index,
            },
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}
