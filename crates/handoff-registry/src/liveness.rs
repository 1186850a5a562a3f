use chrono::{DateTime, Duration, Utc};
use handoff_store::PutOutcome;
use handoff_types::{ServerId, Version};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::registry::{keys, OwnershipRegistry};

/// Heartbeat record for one server process, stored under `srv/`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub server: ServerId,
    pub last_seen: DateTime<Utc>,
    pub seq: u64,
}

impl OwnershipRegistry {
    /// Refresh this server's heartbeat record.
    ///
    /// Each server heartbeats only itself, so a CAS conflict means a stray
    /// concurrent writer; we re-read and try again a couple of times before
    /// giving up.
    pub async fn heartbeat(&self, server: &ServerId) -> RegistryResult<ServerRecord> {
        let key = keys::server(server);
        for _ in 0..3 {
            let seq = match self.kv().get(&key).await? {
                Some(entry) => {
                    let prev: ServerRecord =
                        bincode::deserialize(&entry.bytes).map_err(|e| RegistryError::Corrupt {
                            key: key.clone(),
                            reason: e.to_string(),
                        })?;
                    prev.seq + 1
                }
                None => 1,
            };
            let record = ServerRecord {
                server: server.clone(),
                last_seen: Utc::now(),
                seq,
            };
            let bytes = bincode::serialize(&record).map_err(|e| RegistryError::Corrupt {
                key: key.clone(),
                reason: e.to_string(),
            })?;
            match self.kv().put(&key, Version::new(seq), bytes).await? {
                PutOutcome::Stored => {
                    debug!(server = %server, seq, "heartbeat");
                    return Ok(record);
                }
                PutOutcome::VersionConflict { .. } => {
                    warn!(server = %server, "heartbeat write race, retrying");
                }
            }
        }
        Err(RegistryError::Unavailable(format!(
            "heartbeat for {server} kept losing write races"
        )))
    }

    /// Servers whose heartbeat is fresher than `ttl`.
    pub async fn live_servers(&self, ttl: Duration) -> RegistryResult<Vec<ServerRecord>> {
        let entries = self.kv().list(keys::SERVER_PREFIX).await?;
        let now = Utc::now();
        let mut live = Vec::new();
        for (key, _) in entries {
            let Some(entry) = self.kv().get(&key).await? else {
                continue;
            };
            let record: ServerRecord =
                bincode::deserialize(&entry.bytes).map_err(|e| RegistryError::Corrupt {
                    key: key.clone(),
                    reason: e.to_string(),
                })?;
            if now - record.last_seen <= ttl {
                live.push(record);
            }
        }
        Ok(live)
    }

    /// Whether a particular server has a fresh heartbeat.
    pub async fn is_live(&self, server: &ServerId, ttl: Duration) -> RegistryResult<bool> {
        let key = keys::server(server);
        let Some(entry) = self.kv().get(&key).await? else {
            return Ok(false);
        };
        let record: ServerRecord =
            bincode::deserialize(&entry.bytes).map_err(|e| RegistryError::Corrupt {
                key,
                reason: e.to_string(),
            })?;
        Ok(Utc::now() - record.last_seen <= ttl)
    }
}
