use handoff_transport::TransportError;
use handoff_types::Version;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Conditional put rejected: the attempted version did not strictly
    /// exceed the stored one. Definitive — never retried.
    #[error("version conflict for `{key}`: stored {stored}, attempted {attempted}")]
    VersionConflict {
        key: String,
        stored: Version,
        attempted: Version,
    },

    #[error("not found: {0}")]
    NotFound(String),

    /// Transient backend failure (timeout, refused, closed). Retried with
    /// backoff up to the configured ceiling.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Framing or version mismatch with the backend. Fatal.
    #[error("protocol failure: {0}")]
    Protocol(String),

    /// A stored value failed to decode. Indicates corruption or a writer
    /// running an incompatible encoding.
    #[error("codec failure for `{key}`: {reason}")]
    Codec { key: String, reason: String },
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<TransportError> for StoreError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Protocol(p) => StoreError::Protocol(p.to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
