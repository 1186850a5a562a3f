use std::sync::Arc;

use chrono::{Duration, Utc};
use handoff_store::{KvBackend, PutOutcome};
use handoff_types::{EntityId, OwnershipRecord, OwnershipState, ServerId, Version};
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};

/// Key namespacing for registry records in the shared backend.
pub mod keys {
    use handoff_types::{EntityId, ServerId};

    /// Prefix for per-entity ownership records.
    pub const OWNERSHIP_PREFIX: &str = "own/";
    /// Prefix for server heartbeat records.
    pub const SERVER_PREFIX: &str = "srv/";

    pub fn ownership(entity: &EntityId) -> String {
        format!("{OWNERSHIP_PREFIX}{entity}")
    }

    pub fn server(server: &ServerId) -> String {
        format!("{SERVER_PREFIX}{server}")
    }
}

/// Per-entity ownership state machine over conditional key-value writes.
///
/// Every transition is read-modify-conditional-write on the record's `seq`;
/// the backend's per-key compare-and-swap is the only synchronization, so
/// any number of servers can share one registry without client-side locks.
/// An explicitly constructed, lifetime-scoped object — pass it to the
/// coordinator rather than reaching for process globals.
#[derive(Clone)]
pub struct OwnershipRegistry {
    kv: Arc<dyn KvBackend>,
}

impl OwnershipRegistry {
    pub fn new(kv: Arc<dyn KvBackend>) -> Self {
        Self { kv }
    }

    pub(crate) fn kv(&self) -> &Arc<dyn KvBackend> {
        &self.kv
    }

    async fn load(&self, entity: &EntityId) -> RegistryResult<Option<OwnershipRecord>> {
        let key = keys::ownership(entity);
        let Some(entry) = self.kv.get(&key).await? else {
            return Ok(None);
        };
        let record: OwnershipRecord =
            bincode::deserialize(&entry.bytes).map_err(|e| RegistryError::Corrupt {
                key,
                reason: e.to_string(),
            })?;
        Ok(Some(record))
    }

    /// Conditionally write a record, CAS'ing on its `seq`.
    async fn write(&self, record: &OwnershipRecord) -> RegistryResult<PutOutcome> {
        let key = keys::ownership(&record.entity);
        let bytes = bincode::serialize(record).map_err(|e| RegistryError::Corrupt {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        Ok(self.kv.put(&key, Version::new(record.seq), bytes).await?)
    }

    /// The current ownership record for an entity.
    pub async fn record(&self, entity: &EntityId) -> RegistryResult<OwnershipRecord> {
        self.load(entity)
            .await?
            .ok_or_else(|| RegistryError::NotFound(entity.clone()))
    }

    /// Take ownership of an unowned (or never-seen) entity.
    ///
    /// Fails with [`RegistryError::AlreadyOwned`] if any server holds it or
    /// a transfer is in flight. Re-claiming a released entity continues its
    /// version axis, preserving monotonicity across ownership gaps.
    pub async fn claim(
        &self,
        entity: &EntityId,
        server: &ServerId,
    ) -> RegistryResult<OwnershipRecord> {
        let record = match self.load(entity).await? {
            None => OwnershipRecord {
                entity: entity.clone(),
                state: OwnershipState::Owned(server.clone()),
                version: Version::initial(),
                seq: 1,
                updated_at: Utc::now(),
            },
            Some(prev) if prev.state == OwnershipState::Unowned => OwnershipRecord {
                state: OwnershipState::Owned(server.clone()),
                version: prev.version.next(),
                seq: prev.seq + 1,
                updated_at: Utc::now(),
                ..prev
            },
            Some(_) => return Err(RegistryError::AlreadyOwned(entity.clone())),
        };

        match self.write(&record).await? {
            PutOutcome::Stored => {
                info!(entity = %entity, server = %server, version = %record.version, "claimed");
                Ok(record)
            }
            PutOutcome::VersionConflict { .. } => Err(RegistryError::AlreadyOwned(entity.clone())),
        }
    }

    /// Mark an entity in transit from `from` to `to`.
    ///
    /// Only the current owner may start a transfer, and only one transfer
    /// may be in flight per entity: a concurrent caller loses the write race
    /// and gets [`RegistryError::TransferInProgress`].
    pub async fn begin_transfer(
        &self,
        entity: &EntityId,
        from: &ServerId,
        to: &ServerId,
    ) -> RegistryResult<OwnershipRecord> {
        let prev = self.record(entity).await?;
        match &prev.state {
            OwnershipState::InTransit { .. } => {
                return Err(RegistryError::TransferInProgress(entity.clone()))
            }
            OwnershipState::Owned(owner) if owner == from => {}
            _ => {
                return Err(RegistryError::NotOwner {
                    entity: entity.clone(),
                    claimed: from.to_string(),
                })
            }
        }

        let record = OwnershipRecord {
            state: OwnershipState::InTransit {
                from: from.clone(),
                to: to.clone(),
            },
            seq: prev.seq + 1,
            updated_at: Utc::now(),
            ..prev
        };
        match self.write(&record).await? {
            PutOutcome::Stored => {
                info!(entity = %entity, from = %from, to = %to, version = %record.version, "transfer begun");
                Ok(record)
            }
            PutOutcome::VersionConflict { .. } => {
                Err(RegistryError::TransferInProgress(entity.clone()))
            }
        }
    }

    /// Commit an in-flight transfer: ownership moves to the destination and
    /// the entity version bumps. Irreversible.
    pub async fn commit_transfer(&self, entity: &EntityId) -> RegistryResult<OwnershipRecord> {
        let prev = self.record(entity).await?;
        let OwnershipState::InTransit { to, .. } = &prev.state else {
            return Err(RegistryError::NotInTransit(entity.clone()));
        };

        let record = OwnershipRecord {
            state: OwnershipState::Owned(to.clone()),
            version: prev.version.next(),
            seq: prev.seq + 1,
            updated_at: Utc::now(),
            ..prev.clone()
        };
        match self.write(&record).await? {
            PutOutcome::Stored => {
                info!(entity = %entity, owner = %to, version = %record.version, "transfer committed");
                Ok(record)
            }
            // Most likely a reconciliation sweep aborted us first.
            PutOutcome::VersionConflict { .. } => Err(RegistryError::LostRace(entity.clone())),
        }
    }

    /// Roll an in-flight transfer back to the source. The entity version is
    /// untouched: nothing was committed.
    pub async fn abort_transfer(&self, entity: &EntityId) -> RegistryResult<OwnershipRecord> {
        let prev = self.record(entity).await?;
        let OwnershipState::InTransit { from, .. } = &prev.state else {
            return Err(RegistryError::NotInTransit(entity.clone()));
        };

        let record = OwnershipRecord {
            state: OwnershipState::Owned(from.clone()),
            seq: prev.seq + 1,
            updated_at: Utc::now(),
            ..prev.clone()
        };
        match self.write(&record).await? {
            PutOutcome::Stored => {
                warn!(entity = %entity, owner = %from, version = %record.version, "transfer aborted");
                Ok(record)
            }
            PutOutcome::VersionConflict { .. } => Err(RegistryError::LostRace(entity.clone())),
        }
    }

    /// Give up ownership entirely (despawn path). Only the owner may
    /// release. The record is kept so a later claim continues the version
    /// axis.
    pub async fn release(
        &self,
        entity: &EntityId,
        server: &ServerId,
    ) -> RegistryResult<OwnershipRecord> {
        let prev = self.record(entity).await?;
        match &prev.state {
            OwnershipState::Owned(owner) if owner == server => {}
            _ => {
                return Err(RegistryError::NotOwner {
                    entity: entity.clone(),
                    claimed: server.to_string(),
                })
            }
        }

        let record = OwnershipRecord {
            state: OwnershipState::Unowned,
            seq: prev.seq + 1,
            updated_at: Utc::now(),
            ..prev
        };
        match self.write(&record).await? {
            PutOutcome::Stored => {
                info!(entity = %entity, server = %server, "released");
                Ok(record)
            }
            PutOutcome::VersionConflict { .. } => Err(RegistryError::LostRace(entity.clone())),
        }
    }

    /// Advance the entity version without changing ownership (save path).
    /// Keeps the snapshot version axis and the record aligned so a stale
    /// owner's snapshot write is always rejected by the store.
    pub async fn bump_version(
        &self,
        entity: &EntityId,
        server: &ServerId,
    ) -> RegistryResult<OwnershipRecord> {
        let prev = self.record(entity).await?;
        match &prev.state {
            OwnershipState::Owned(owner) if owner == server => {}
            _ => {
                return Err(RegistryError::NotOwner {
                    entity: entity.clone(),
                    claimed: server.to_string(),
                })
            }
        }

        let record = OwnershipRecord {
            version: prev.version.next(),
            seq: prev.seq + 1,
            updated_at: Utc::now(),
            ..prev
        };
        match self.write(&record).await? {
            PutOutcome::Stored => Ok(record),
            PutOutcome::VersionConflict { .. } => Err(RegistryError::LostRace(entity.clone())),
        }
    }

    /// Reconciliation sweep: force-abort every transfer stuck `InTransit`
    /// longer than `deadline`, returning ownership to the source server.
    ///
    /// Favoring the source over optimistic forward progress avoids orphaned
    /// entities when a destination crashes mid-handoff. Any server may run
    /// the sweep; concurrent sweeps race on the record CAS and exactly one
    /// abort lands per stuck entity.
    pub async fn reconcile(&self, deadline: Duration) -> RegistryResult<Vec<EntityId>> {
        let entries = self.kv.list(keys::OWNERSHIP_PREFIX).await?;
        let now = Utc::now();
        let mut aborted = Vec::new();

        for (key, _) in entries {
            let Some(id_str) = key.strip_prefix(keys::OWNERSHIP_PREFIX) else {
                continue;
            };
            let Ok(entity) = EntityId::parse(id_str) else {
                warn!(key, "skipping malformed ownership key");
                continue;
            };
            let Some(record) = self.load(&entity).await? else {
                continue; // deleted between list and load
            };
            if !record.is_in_transit() || record.age(now) <= deadline {
                continue;
            }

            warn!(
                entity = %entity,
                stuck_for_ms = record.age(now).num_milliseconds(),
                "transfer exceeded deadline, forcing abort"
            );
            match self.abort_transfer(&entity).await {
                Ok(_) => aborted.push(entity),
                // Another sweeper or the coordinator resolved it first.
                Err(RegistryError::LostRace(_)) | Err(RegistryError::NotInTransit(_)) => {
                    debug!(entity = %id_str, "stuck transfer resolved concurrently");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(aborted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_store::MemoryKv;

    fn registry() -> OwnershipRegistry {
        OwnershipRegistry::new(Arc::new(MemoryKv::new()))
    }

    fn entity() -> EntityId {
        EntityId::new("player", "e1").unwrap()
    }

    fn server(n: &str) -> ServerId {
        ServerId::new("server", n).unwrap()
    }

    #[tokio::test]
    async fn claim_fresh_entity() {
        let reg = registry();
        let record = reg.claim(&entity(), &server("a")).await.unwrap();
        assert_eq!(record.state, OwnershipState::Owned(server("a")));
        assert_eq!(record.version, Version::initial());
    }

    #[tokio::test]
    async fn double_claim_is_rejected() {
        let reg = registry();
        reg.claim(&entity(), &server("a")).await.unwrap();
        let err = reg.claim(&entity(), &server("b")).await.unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyOwned(_)));
    }

    #[tokio::test]
    async fn transfer_commit_moves_ownership_and_bumps_version() {
        let reg = registry();
        reg.claim(&entity(), &server("a")).await.unwrap();

        let in_transit = reg
            .begin_transfer(&entity(), &server("a"), &server("b"))
            .await
            .unwrap();
        assert!(in_transit.is_in_transit());
        assert_eq!(in_transit.version, Version::new(1)); // begin does not bump

        let committed = reg.commit_transfer(&entity()).await.unwrap();
        assert_eq!(committed.state, OwnershipState::Owned(server("b")));
        assert_eq!(committed.version, Version::new(2));
    }

    #[tokio::test]
    async fn abort_returns_ownership_without_version_bump() {
        let reg = registry();
        reg.claim(&entity(), &server("a")).await.unwrap();
        reg.begin_transfer(&entity(), &server("a"), &server("b"))
            .await
            .unwrap();

        let aborted = reg.abort_transfer(&entity()).await.unwrap();
        assert_eq!(aborted.state, OwnershipState::Owned(server("a")));
        assert_eq!(aborted.version, Version::new(1));
    }

    #[tokio::test]
    async fn only_owner_may_begin_transfer() {
        let reg = registry();
        reg.claim(&entity(), &server("a")).await.unwrap();

        let err = reg
            .begin_transfer(&entity(), &server("b"), &server("c"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotOwner { .. }));
    }

    #[tokio::test]
    async fn concurrent_begin_transfer_admits_exactly_one() {
        let reg = registry();
        reg.claim(&entity(), &server("a")).await.unwrap();

        let (entity_id, src, dst1, dst2) = (entity(), server("a"), server("b"), server("c"));
        let first = reg.begin_transfer(&entity_id, &src, &dst1);
        let second = reg.begin_transfer(&entity_id, &src, &dst2);
        let (r1, r2) = tokio::join!(first, second);

        let succeeded = [r1.is_ok(), r2.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(succeeded, 1, "exactly one transfer may begin");
        for result in [r1, r2] {
            if let Err(err) = result {
                assert!(matches!(err, RegistryError::TransferInProgress(_)));
            }
        }
    }

    #[tokio::test]
    async fn commit_without_transfer_fails() {
        let reg = registry();
        reg.claim(&entity(), &server("a")).await.unwrap();
        let err = reg.commit_transfer(&entity()).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotInTransit(_)));
    }

    #[tokio::test]
    async fn reclaim_after_release_continues_version_axis() {
        let reg = registry();
        reg.claim(&entity(), &server("a")).await.unwrap();
        reg.bump_version(&entity(), &server("a")).await.unwrap(); // v2
        reg.release(&entity(), &server("a")).await.unwrap();

        let record = reg.claim(&entity(), &server("b")).await.unwrap();
        assert_eq!(record.version, Version::new(3));
        assert_eq!(record.state, OwnershipState::Owned(server("b")));
    }

    #[tokio::test]
    async fn reconcile_aborts_only_expired_transfers() {
        let reg = registry();
        let stuck = EntityId::new("player", "stuck").unwrap();
        let fresh = EntityId::new("player", "fresh").unwrap();

        reg.claim(&stuck, &server("a")).await.unwrap();
        reg.claim(&fresh, &server("a")).await.unwrap();
        reg.begin_transfer(&stuck, &server("a"), &server("b")).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
        reg.begin_transfer(&fresh, &server("a"), &server("b")).await.unwrap();

        let aborted = reg.reconcile(Duration::milliseconds(10)).await.unwrap();
        assert_eq!(aborted, vec![stuck.clone()]);

        let stuck_record = reg.record(&stuck).await.unwrap();
        assert_eq!(stuck_record.state, OwnershipState::Owned(server("a")));
        assert!(reg.record(&fresh).await.unwrap().is_in_transit());
    }
}
