use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use handoff_types::Version;

use crate::backend::{KvBackend, PutOutcome, Versioned};
use crate::error::StoreResult;

/// In-memory, map-based versioned key-value backend.
///
/// The local stand-in for the shared backend service: tests, single-server
/// development, and the reference backend server all run on it. The whole
/// map sits behind one `RwLock`, which trivially provides the per-key
/// atomicity the conditional put requires.
pub struct MemoryKv {
    entries: RwLock<BTreeMap<String, Versioned>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvBackend for MemoryKv {
    async fn get(&self, key: &str) -> StoreResult<Option<Versioned>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    async fn put(&self, key: &str, version: Version, bytes: Vec<u8>) -> StoreResult<PutOutcome> {
        let mut map = self.entries.write().expect("lock poisoned");
        if let Some(existing) = map.get(key) {
            if version <= existing.version {
                return Ok(PutOutcome::VersionConflict {
                    stored: existing.version,
                });
            }
        }
        map.insert(key.to_string(), Versioned { version, bytes });
        Ok(PutOutcome::Stored)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut map = self.entries.write().expect("lock poisoned");
        Ok(map.remove(key).is_some())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<(String, Version)>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.version))
            .collect())
    }
}

impl std::fmt::Debug for MemoryKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKv").field("entries", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let kv = MemoryKv::new();
        kv.put("state/player.e1", Version::new(1), b"a".to_vec())
            .await
            .unwrap();
        let entry = kv.get("state/player.e1").await.unwrap().unwrap();
        assert_eq!(entry.version, Version::new(1));
        assert_eq!(entry.bytes, b"a");
    }

    #[tokio::test]
    async fn put_requires_strictly_greater_version() {
        let kv = MemoryKv::new();
        kv.put("k", Version::new(2), b"v2".to_vec()).await.unwrap();

        // Equal version is rejected.
        let outcome = kv.put("k", Version::new(2), b"again".to_vec()).await.unwrap();
        assert_eq!(outcome, PutOutcome::VersionConflict { stored: Version::new(2) });

        // Lower version is rejected and the stored value is untouched.
        let outcome = kv.put("k", Version::new(1), b"stale".to_vec()).await.unwrap();
        assert_eq!(outcome, PutOutcome::VersionConflict { stored: Version::new(2) });
        assert_eq!(kv.get("k").await.unwrap().unwrap().bytes, b"v2");

        // Strictly greater wins.
        let outcome = kv.put("k", Version::new(3), b"v3".to_vec()).await.unwrap();
        assert_eq!(outcome, PutOutcome::Stored);
        assert_eq!(kv.get("k").await.unwrap().unwrap().version, Version::new(3));
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let kv = MemoryKv::new();
        kv.put("k", Version::new(1), vec![]).await.unwrap();
        assert!(kv.delete("k").await.unwrap());
        assert!(!kv.delete("k").await.unwrap());
        assert!(kv.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_filters_by_prefix_sorted() {
        let kv = MemoryKv::new();
        kv.put("own/player.b", Version::new(1), vec![]).await.unwrap();
        kv.put("own/player.a", Version::new(2), vec![]).await.unwrap();
        kv.put("state/player.a", Version::new(3), vec![]).await.unwrap();

        let owned = kv.list("own/").await.unwrap();
        assert_eq!(
            owned,
            vec![
                ("own/player.a".to_string(), Version::new(2)),
                ("own/player.b".to_string(), Version::new(1)),
            ]
        );

        assert!(kv.list("srv/").await.unwrap().is_empty());
    }
}
