use handoff_registry::RegistryError;
use handoff_store::StoreError;
use thiserror::Error;

use crate::proxy::ProxyError;

/// Failures surfaced by coordinator operations that never got a saga off
/// the ground (fail-fast rejections and lifecycle errors). Failures *inside*
/// a running migration are translated into a
/// [`MigrationOutcome`](crate::MigrationOutcome) instead.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

pub type MigrationResult<T> = Result<T, MigrationError>;
