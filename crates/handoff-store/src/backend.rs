use async_trait::async_trait;
use handoff_types::{EntityId, Version};

use crate::error::StoreResult;

/// Key namespacing for the shared backend.
///
/// All Handoff state lives under typed prefixes so operators and the
/// reconciliation sweep can scan one kind of record at a time.
pub mod keys {
    use super::EntityId;

    /// Prefix for entity state snapshots.
    pub const SNAPSHOT_PREFIX: &str = "state/";

    pub fn snapshot(entity: &EntityId) -> String {
        format!("{SNAPSHOT_PREFIX}{entity}")
    }
}

/// A stored value paired with the version it was written at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned {
    pub version: Version,
    pub bytes: Vec<u8>,
}

/// Result of a conditional put.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    /// Rejected: the supplied version did not strictly exceed `stored`.
    VersionConflict { stored: Version },
}

/// Versioned key-value storage with compare-and-swap writes.
///
/// All implementations must satisfy these invariants:
/// - `put` succeeds only when the supplied version strictly exceeds the
///   stored version, or the key is absent. This per-key atomicity is the
///   only cross-server synchronization Handoff relies on.
/// - A rejected put leaves the stored value untouched and reports the
///   stored version.
/// - `get` after a successful `put` observes that put or a newer one,
///   never an older value.
/// - The backend never interprets value bytes.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Read a key. `Ok(None)` when absent.
    async fn get(&self, key: &str) -> StoreResult<Option<Versioned>>;

    /// Conditional write: stored only if `version` strictly exceeds the
    /// currently stored version (or the key is absent).
    async fn put(&self, key: &str, version: Version, bytes: Vec<u8>) -> StoreResult<PutOutcome>;

    /// Remove a key. Returns `true` if it existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// All keys under a prefix with their stored versions, sorted by key.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<(String, Version)>>;
}
