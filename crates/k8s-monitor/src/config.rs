//! Monitor tuning settings

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Environment variable prefix for tuning settings
pub const ENV_PREFIX: &str = "K8S_MONITOR";

/// Monitor settings, read from `K8S_MONITOR_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSettings {
    /// Seconds between polls
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Per-request timeout in seconds; 0 disables it
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Consecutive failures before the provider is reported unhealthy; 0 never escalates
    #[serde(default = "default_unhealthy_after")]
    pub unhealthy_after: u32,

    /// Port for /healthz, /readyz and /metrics; unset disables the server
    #[serde(default)]
    pub listen_port: Option<u16>,
}

fn default_interval_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_unhealthy_after() -> u32 {
    3
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            unhealthy_after: default_unhealthy_after(),
            listen_port: None,
        }
    }
}

impl MonitorSettings {
    /// Load settings from the process environment
    pub fn load() -> Result<Self> {
        Self::from_env(config::Environment::with_prefix(ENV_PREFIX))
    }

    fn from_env(env: config::Environment) -> Result<Self> {
        let settings: Self = config::Config::builder()
            .add_source(env.try_parsing(true))
            .build()
            .context("Failed to read K8S_MONITOR_* settings")?
            .try_deserialize()
            .context("Invalid K8S_MONITOR_* settings")?;

        if settings.interval_secs == 0 {
            anyhow::bail!("K8S_MONITOR_INTERVAL_SECS must be greater than zero");
        }

        Ok(settings)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}
