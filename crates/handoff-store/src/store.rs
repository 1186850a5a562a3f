use std::future::Future;
use std::sync::Arc;

use handoff_types::{EntityId, PersistedSnapshot};
use tracing::{debug, warn};

use crate::backend::{keys, KvBackend, PutOutcome};
use crate::error::{StoreError, StoreResult};
use crate::retry::RetryPolicy;

/// Snapshot persistence over a [`KvBackend`].
///
/// Owns key namespacing, snapshot encoding, and the retry policy: transient
/// failures are retried with bounded exponential backoff, conflicts and
/// protocol failures are surfaced immediately. Exhausting retries surfaces
/// `Unavailable` so the migration coordinator can roll back an in-progress
/// transfer rather than leave it in transit.
#[derive(Clone)]
pub struct StateStore {
    backend: Arc<dyn KvBackend>,
    retry: RetryPolicy,
}

impl StateStore {
    pub fn new(backend: Arc<dyn KvBackend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    /// Conditionally persist a snapshot at its version.
    ///
    /// Succeeds only if the version strictly exceeds the stored snapshot's
    /// version; otherwise [`StoreError::VersionConflict`] — the caller is a
    /// stale writer and must not blindly retry.
    pub async fn put_snapshot(&self, snapshot: &PersistedSnapshot) -> StoreResult<()> {
        let key = keys::snapshot(&snapshot.entity);
        let bytes = bincode::serialize(snapshot).map_err(|e| StoreError::Codec {
            key: key.clone(),
            reason: e.to_string(),
        })?;

        let outcome = self
            .with_retry("put_snapshot", &key, || {
                self.backend.put(&key, snapshot.version, bytes.clone())
            })
            .await?;

        match outcome {
            PutOutcome::Stored => {
                debug!(entity = %snapshot.entity, version = %snapshot.version, "snapshot stored");
                Ok(())
            }
            PutOutcome::VersionConflict { stored } => {
                warn!(
                    entity = %snapshot.entity,
                    attempted = %snapshot.version,
                    stored = %stored,
                    "snapshot rejected: stale version"
                );
                Err(StoreError::VersionConflict {
                    key,
                    stored,
                    attempted: snapshot.version,
                })
            }
        }
    }

    /// Fetch the stored snapshot for an entity.
    pub async fn get_snapshot(&self, entity: &EntityId) -> StoreResult<PersistedSnapshot> {
        let key = keys::snapshot(entity);
        let entry = self
            .with_retry("get_snapshot", &key, || self.backend.get(&key))
            .await?
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        let snapshot: PersistedSnapshot =
            bincode::deserialize(&entry.bytes).map_err(|e| StoreError::Codec {
                key: key.clone(),
                reason: e.to_string(),
            })?;
        if snapshot.entity != *entity || snapshot.version != entry.version {
            return Err(StoreError::Codec {
                key,
                reason: "stored snapshot does not match its key or version".into(),
            });
        }
        Ok(snapshot)
    }

    /// Remove an entity's snapshot (despawn path). Deleting an absent key
    /// is not an error.
    pub async fn delete_snapshot(&self, entity: &EntityId) -> StoreResult<()> {
        let key = keys::snapshot(entity);
        let existed = self
            .with_retry("delete_snapshot", &key, || self.backend.delete(&key))
            .await?;
        debug!(entity = %entity, existed, "snapshot deleted");
        Ok(())
    }

    async fn with_retry<T, F, Fut>(&self, op: &str, key: &str, mut call: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match call().await {
                Err(err) if err.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    attempt += 1;
                    warn!(
                        op,
                        key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient store failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Versioned;
    use crate::memory::MemoryKv;
    use async_trait::async_trait;
    use handoff_types::Version;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Backend wrapper that fails the first `failures` calls with
    /// `Unavailable` and counts every call it sees.
    struct FlakyKv {
        inner: MemoryKv,
        failures: AtomicU32,
        calls: AtomicU32,
    }

    impl FlakyKv {
        fn new(failures: u32) -> Self {
            Self {
                inner: MemoryKv::new(),
                failures: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
            }
        }

        fn maybe_fail(&self) -> StoreResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Unavailable("injected outage".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl KvBackend for FlakyKv {
        async fn get(&self, key: &str) -> StoreResult<Option<Versioned>> {
            self.maybe_fail()?;
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, version: Version, bytes: Vec<u8>) -> StoreResult<PutOutcome> {
            self.maybe_fail()?;
            self.inner.put(key, version, bytes).await
        }

        async fn delete(&self, key: &str) -> StoreResult<bool> {
            self.maybe_fail()?;
            self.inner.delete(key).await
        }

        async fn list(&self, prefix: &str) -> StoreResult<Vec<(String, Version)>> {
            self.maybe_fail()?;
            self.inner.list(prefix).await
        }
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            multiplier: 1.0,
        }
    }

    fn entity() -> EntityId {
        EntityId::new("player", "e1").unwrap()
    }

    fn snapshot(version: u64, payload: &[u8]) -> PersistedSnapshot {
        PersistedSnapshot::new(entity(), Version::new(version), payload.to_vec())
    }

    #[tokio::test]
    async fn snapshot_roundtrip() {
        let store = StateStore::new(Arc::new(MemoryKv::new()), RetryPolicy::none());
        store.put_snapshot(&snapshot(1, b"hp=50")).await.unwrap();

        let loaded = store.get_snapshot(&entity()).await.unwrap();
        assert_eq!(loaded.version, Version::new(1));
        assert_eq!(loaded.payload, b"hp=50");
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let store = StateStore::new(Arc::new(MemoryKv::new()), RetryPolicy::none());
        store.put_snapshot(&snapshot(1, b"x")).await.unwrap();
        store.delete_snapshot(&entity()).await.unwrap();

        let err = store.get_snapshot(&entity()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn stale_put_is_rejected_and_not_retried() {
        let backend = Arc::new(FlakyKv::new(0));
        let store = StateStore::new(backend.clone(), fast_retry(5));
        store.put_snapshot(&snapshot(4, b"new")).await.unwrap();

        let calls_before = backend.calls.load(Ordering::SeqCst);
        let err = store.put_snapshot(&snapshot(3, b"stale")).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict { stored, attempted, .. }
                if stored == Version::new(4) && attempted == Version::new(3)
        ));
        // Conflicts are definitive: exactly one backend call, no retries.
        assert_eq!(backend.calls.load(Ordering::SeqCst), calls_before + 1);

        // The stored snapshot is untouched.
        assert_eq!(store.get_snapshot(&entity()).await.unwrap().payload, b"new");
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let backend = Arc::new(FlakyKv::new(2));
        let store = StateStore::new(backend.clone(), fast_retry(4));

        store.put_snapshot(&snapshot(1, b"x")).await.unwrap();
        // Two failures plus the success.
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_unavailable() {
        let backend = Arc::new(FlakyKv::new(10));
        let store = StateStore::new(backend.clone(), fast_retry(2));

        let err = store.put_snapshot(&snapshot(1, b"x")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        // Initial attempt plus two retries.
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }
}
