use handoff_registry::{OwnershipRegistry, RegistryError};
use handoff_store::{StateStore, StoreError};
use handoff_types::{EntityId, OwnershipRecord, OwnershipState, PersistedSnapshot, ServerId, Version};
use tracing::{error, info, warn};

use crate::config::HandoffConfig;
use crate::error::MigrationResult;
use crate::proxy::{EntityProxy, ProxyError};

/// Saga-level result of one migration attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Ownership moved to the destination. `rehydrated` is `false` when the
    /// destination failed to resume the entity — a destination-local
    /// recovery problem, never a registry rollback.
    Committed {
        entity: EntityId,
        version: Version,
        rehydrated: bool,
    },
    /// The transfer was rolled back; the source still owns the entity and a
    /// retry of the whole migration from a clean state may succeed.
    Aborted { entity: EntityId, reason: String },
    /// The transfer was rolled back and retrying without intervention
    /// cannot succeed (protocol mismatch, corrupt data, unsupported proxy).
    FailedPermanently { entity: EntityId, reason: String },
}

/// Orchestrates entity lifecycle and the cross-server handoff saga for one
/// server process.
///
/// The coordinator is the only component that mutates the ownership
/// registry in response to failures; the store and transport surface raw
/// failure kinds and the coordinator translates them into outcomes.
pub struct MigrationCoordinator {
    server: ServerId,
    registry: OwnershipRegistry,
    store: StateStore,
    config: HandoffConfig,
}

impl MigrationCoordinator {
    pub fn new(
        server: ServerId,
        registry: OwnershipRegistry,
        store: StateStore,
        config: HandoffConfig,
    ) -> Self {
        Self {
            server,
            registry,
            store,
            config,
        }
    }

    pub fn server(&self) -> &ServerId {
        &self.server
    }

    /// Migrate an entity this server owns to `to`.
    ///
    /// The saga: mark in transit, snapshot at the source, persist with the
    /// next version, commit the registry entry, rehydrate at the
    /// destination. Failures before the commit abort the transfer back to
    /// the source; the commit is the point of no return.
    ///
    /// Fail-fast rejections (not the owner, transfer already in flight)
    /// come back as `Err`; everything after a successful `begin_transfer`
    /// is reported as a [`MigrationOutcome`].
    pub async fn migrate(
        &self,
        entity: &EntityId,
        to: &ServerId,
        source: &dyn EntityProxy,
        dest: &dyn EntityProxy,
    ) -> MigrationResult<MigrationOutcome> {
        let record = self
            .registry
            .begin_transfer(entity, &self.server, to)
            .await?;
        info!(entity = %entity, to = %to, version = %record.version, "migration started");

        // Suspend and snapshot at the source.
        let payload = match self.snapshot_with_retries(entity, source).await {
            Ok(payload) => payload,
            Err(err) => {
                let permanent = !err.is_transient();
                return self
                    .abort(entity, format!("source snapshot failed: {err}"), permanent)
                    .await;
            }
        };

        // Persist ahead of the commit so the destination always has state
        // to rehydrate from, whatever happens to this process next.
        let version = record.version.next();
        let snapshot = PersistedSnapshot::new(entity.clone(), version, payload.clone());
        if let Err(err) = self.store.put_snapshot(&snapshot).await {
            let permanent = matches!(err, StoreError::Protocol(_) | StoreError::Codec { .. });
            return self
                .abort(entity, format!("snapshot persist failed: {err}"), permanent)
                .await;
        }

        // Point of no return.
        let committed = match self.registry.commit_transfer(entity).await {
            Ok(record) => record,
            Err(RegistryError::LostRace(_)) | Err(RegistryError::NotInTransit(_)) => {
                // The reconciliation sweep beat us to it: the transfer sat
                // past its deadline and was forced back to us.
                warn!(entity = %entity, "commit lost to reconciliation, transfer aborted");
                return Ok(MigrationOutcome::Aborted {
                    entity: entity.clone(),
                    reason: "transfer deadline passed before commit".into(),
                });
            }
            Err(err) => return self.resolve_unknown_commit(entity, to, err).await,
        };

        // Resume at the destination. Ownership and durability must not
        // regress past this point, so a rehydration failure is reported
        // but never rolled back.
        let rehydrated = match dest.rehydrate(entity, &payload).await {
            Ok(()) => true,
            Err(err) => {
                error!(
                    entity = %entity,
                    version = %committed.version,
                    error = %err,
                    "rehydration failed after commit; destination must recover locally"
                );
                false
            }
        };

        info!(
            entity = %entity,
            version = %committed.version,
            owner = %to,
            rehydrated,
            "migration committed"
        );
        Ok(MigrationOutcome::Committed {
            entity: entity.clone(),
            version: committed.version,
            rehydrated,
        })
    }

    /// Register a freshly spawned entity: claim ownership and persist its
    /// initial snapshot. If the snapshot write fails the claim is kept; the
    /// next save covers it.
    pub async fn register_spawn(
        &self,
        entity: &EntityId,
        payload: Vec<u8>,
    ) -> MigrationResult<OwnershipRecord> {
        let record = self.registry.claim(entity, &self.server).await?;
        let snapshot = PersistedSnapshot::new(entity.clone(), record.version, payload);
        self.store.put_snapshot(&snapshot).await?;
        info!(entity = %entity, version = %record.version, "entity registered");
        Ok(record)
    }

    /// Persist the entity's current state. Advances the shared version axis
    /// so the snapshot and the ownership record stay aligned.
    pub async fn save(&self, entity: &EntityId, payload: Vec<u8>) -> MigrationResult<Version> {
        let record = self.registry.bump_version(entity, &self.server).await?;
        let snapshot = PersistedSnapshot::new(entity.clone(), record.version, payload);
        self.store.put_snapshot(&snapshot).await?;
        Ok(record.version)
    }

    /// Remove a despawned entity: give up ownership, then delete its
    /// snapshot. Release comes first so a failed delete leaves an orphaned
    /// snapshot (harmless, retained until deleted) rather than an owned
    /// entity with no state.
    pub async fn despawn(&self, entity: &EntityId) -> MigrationResult<()> {
        self.registry.release(entity, &self.server).await?;
        self.store.delete_snapshot(entity).await?;
        info!(entity = %entity, "entity despawned");
        Ok(())
    }

    async fn snapshot_with_retries(
        &self,
        entity: &EntityId,
        source: &dyn EntityProxy,
    ) -> Result<Vec<u8>, ProxyError> {
        let mut attempt: u32 = 0;
        loop {
            match source.serialize(entity).await {
                Ok(payload) => return Ok(payload),
                Err(err) if err.is_transient() && attempt < self.config.snapshot_retries => {
                    attempt += 1;
                    warn!(entity = %entity, attempt, error = %err, "entity not ready to snapshot, retrying");
                    tokio::time::sleep(self.config.snapshot_retry_delay()).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Roll a failed transfer back to the source and translate into an
    /// outcome. If the abort itself cannot land, the record stays
    /// `InTransit` and the reconciliation sweep resolves it.
    async fn abort(
        &self,
        entity: &EntityId,
        reason: String,
        permanent: bool,
    ) -> MigrationResult<MigrationOutcome> {
        match self.registry.abort_transfer(entity).await {
            Ok(_) => warn!(entity = %entity, reason, "migration aborted"),
            Err(err) => error!(
                entity = %entity,
                reason,
                error = %err,
                "abort did not land; reconciliation sweep will resolve"
            ),
        }
        Ok(if permanent {
            MigrationOutcome::FailedPermanently {
                entity: entity.clone(),
                reason,
            }
        } else {
            MigrationOutcome::Aborted {
                entity: entity.clone(),
                reason,
            }
        })
    }

    /// A commit call failed in a way that leaves its outcome unknown
    /// (e.g. the registry backend went away mid-write). Re-read the record
    /// to find out which side of the point of no return we are on.
    async fn resolve_unknown_commit(
        &self,
        entity: &EntityId,
        to: &ServerId,
        err: RegistryError,
    ) -> MigrationResult<MigrationOutcome> {
        warn!(entity = %entity, error = %err, "commit outcome unknown, re-reading record");
        match self.registry.record(entity).await {
            Ok(record) if record.state == OwnershipState::Owned(to.clone()) => {
                Ok(MigrationOutcome::Committed {
                    entity: entity.clone(),
                    version: record.version,
                    rehydrated: false,
                })
            }
            Ok(record) if record.is_in_transit() => {
                self.abort(entity, format!("commit failed: {err}"), false).await
            }
            Ok(_) => Ok(MigrationOutcome::Aborted {
                entity: entity.clone(),
                reason: format!("commit failed and transfer was resolved concurrently: {err}"),
            }),
            Err(read_err) => {
                error!(
                    entity = %entity,
                    error = %read_err,
                    "registry unreadable after failed commit; reconciliation sweep will resolve"
                );
                Ok(MigrationOutcome::Aborted {
                    entity: entity.clone(),
                    reason: format!("commit outcome unknown: {err}"),
                })
            }
        }
    }
}
