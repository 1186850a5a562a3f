use std::path::Path;
use std::time::Duration;

use handoff_store::RetryPolicy;
use handoff_transport::TransportConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Full configuration surface for one Handoff server process.
///
/// Everything is externally supplied; the `Default` values are documented
/// fallbacks for development, not baked-in policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    /// Transport to the key-value backend (endpoint, pool size, timeouts).
    pub backend: TransportConfig,
    /// Backoff policy for transient store failures.
    pub retry: RetryPolicy,
    /// How long a transfer may sit `InTransit` before the sweep aborts it.
    pub transfer_deadline_ms: u64,
    /// Interval between reconciliation sweeps (and heartbeats).
    pub sweep_interval_ms: u64,
    /// How stale a heartbeat may be before a server counts as dead.
    pub heartbeat_ttl_ms: u64,
    /// How many times to re-ask a proxy that cannot suspend its entity yet.
    pub snapshot_retries: u32,
    /// Delay between snapshot attempts.
    pub snapshot_retry_delay_ms: u64,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            backend: TransportConfig::default(),
            retry: RetryPolicy::default(),
            transfer_deadline_ms: 30_000,
            sweep_interval_ms: 10_000,
            heartbeat_ttl_ms: 60_000,
            snapshot_retries: 3,
            snapshot_retry_delay_ms: 100,
        }
    }
}

impl HandoffConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn transfer_deadline(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.transfer_deadline_ms as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn heartbeat_ttl(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.heartbeat_ttl_ms as i64)
    }

    pub fn snapshot_retry_delay(&self) -> Duration {
        Duration::from_millis(self.snapshot_retry_delay_ms)
    }
}
