use std::time::Duration;

use handoff_registry::OwnershipRegistry;
use handoff_types::ServerId;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::HandoffConfig;

/// Periodic background sweep keeping the cluster's ownership records sane.
///
/// Each tick the reconciler heartbeats this server's liveness record and
/// force-aborts transfers stuck `InTransit` past the configured deadline,
/// returning those entities to their source owner. Any server may run the
/// sweep; record writes go through the same compare-and-set path as every
/// other registry mutation, so overlapping sweeps race harmlessly.
pub struct Reconciler {
    registry: OwnershipRegistry,
    server: ServerId,
    sweep_interval: Duration,
    transfer_deadline: chrono::Duration,
}

/// Handle to a spawned [`Reconciler`] task. Dropping the handle without
/// calling [`ReconcilerHandle::stop`] detaches the task.
pub struct ReconcilerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Signal the sweep loop to exit and wait for it.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

impl Reconciler {
    pub fn new(registry: OwnershipRegistry, server: ServerId, config: &HandoffConfig) -> Self {
        Self {
            registry,
            server,
            sweep_interval: config.sweep_interval(),
            transfer_deadline: config.transfer_deadline(),
        }
    }

    /// Run the sweep loop until the returned handle is stopped.
    pub fn spawn(self) -> ReconcilerHandle {
        let (shutdown, mut stopped) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.sweep_interval);
            // The first tick fires immediately, registering liveness at startup.
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.sweep_once().await,
                    _ = stopped.changed() => {
                        info!(server = %self.server, "reconciler stopping");
                        return;
                    }
                }
            }
        });
        ReconcilerHandle { shutdown, task }
    }

    /// One heartbeat-and-sweep pass. Failures are logged, never fatal; the
    /// next tick tries again.
    async fn sweep_once(&self) {
        if let Err(err) = self.registry.heartbeat(&self.server).await {
            warn!(server = %self.server, error = %err, "heartbeat failed");
        }
        match self.registry.reconcile(self.transfer_deadline).await {
            Ok(aborted) if aborted.is_empty() => {}
            Ok(aborted) => {
                for entity in &aborted {
                    info!(entity = %entity, "stuck transfer returned to source");
                }
            }
            Err(err) => warn!(server = %self.server, error = %err, "reconciliation sweep failed"),
        }
    }
}
