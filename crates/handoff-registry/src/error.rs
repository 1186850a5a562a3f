use handoff_store::StoreError;
use handoff_types::EntityId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("entity `{0}` is already owned")]
    AlreadyOwned(EntityId),

    #[error("entity `{entity}` is not owned by `{claimed}`")]
    NotOwner { entity: EntityId, claimed: String },

    #[error("a transfer is already in flight for `{0}`")]
    TransferInProgress(EntityId),

    #[error("entity `{0}` is not in transit")]
    NotInTransit(EntityId),

    #[error("no ownership record for `{0}`")]
    NotFound(EntityId),

    /// A concurrent writer changed the record between our read and our
    /// conditional write. Definitive for this attempt; the caller re-reads
    /// if it wants to try again.
    #[error("lost a concurrent registry write race for `{0}`")]
    LostRace(EntityId),

    #[error("registry storage unavailable: {0}")]
    Unavailable(String),

    #[error("registry protocol failure: {0}")]
    Protocol(String),

    #[error("corrupt registry record at `{key}`: {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => RegistryError::Unavailable(msg),
            StoreError::Protocol(msg) => RegistryError::Protocol(msg),
            StoreError::Codec { key, reason } => RegistryError::Corrupt { key, reason },
            other => RegistryError::Protocol(other.to_string()),
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
