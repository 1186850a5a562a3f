use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub bind_addr: SocketAddr,
    /// Ceiling on concurrently served connections; accepts beyond it wait.
    pub max_connections: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7400".parse().expect("static address"),
            max_connections: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = BackendConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:7400".parse::<SocketAddr>().unwrap());
        assert_eq!(c.max_connections, 256);
    }
}
