use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::EntityId;
use crate::version::Version;

/// A durably stored, versioned state payload for one entity.
///
/// The payload is opaque to the core: the engine-side proxy produces it on
/// `serialize` and consumes it on `rehydrate`. A snapshot's version must be
/// at least the ownership record's version at write time; the store's
/// conditional put rejects anything lower.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub entity: EntityId,
    pub version: Version,
    pub payload: Vec<u8>,
    pub written_at: DateTime<Utc>,
}

impl PersistedSnapshot {
    pub fn new(entity: EntityId, version: Version, payload: Vec<u8>) -> Self {
        Self {
            entity,
            version,
            payload,
            written_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for PersistedSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedSnapshot")
            .field("entity", &self.entity)
            .field("version", &self.version)
            .field("payload_len", &self.payload.len())
            .field("written_at", &self.written_at)
            .finish()
    }
}
