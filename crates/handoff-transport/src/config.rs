use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Transport tuning for one endpoint.
///
/// All knobs are externally supplied; the defaults below are documented
/// fallbacks, not baked-in policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// `host:port` of the backend or peer.
    pub endpoint: String,
    /// Upper bound on pooled (and therefore concurrent) connections.
    pub pool_size: usize,
    /// Per-call timeout covering one request/response exchange.
    pub call_timeout_ms: u64,
    /// How many times a failed call is retried on a fresh connection.
    pub call_retries: u32,
    /// Connection-establishment attempts before giving up.
    pub connect_attempts: u32,
    /// Delay between connection attempts.
    pub connect_backoff_ms: u64,
    /// TLS settings; `None` keeps the plain-TCP transport.
    #[cfg(feature = "tls")]
    pub tls: Option<TlsSettings>,
}

impl TransportConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:7400".to_string(),
            pool_size: 4,
            call_timeout_ms: 5_000,
            call_retries: 1,
            connect_attempts: 3,
            connect_backoff_ms: 200,
            #[cfg(feature = "tls")]
            tls: None,
        }
    }
}

/// Certificate material for the encrypted transport variant.
#[cfg(feature = "tls")]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TlsSettings {
    /// PEM bundle of roots to trust for the backend certificate.
    pub ca_path: std::path::PathBuf,
    /// Name presented by the backend certificate.
    pub server_name: String,
}
