use handoff_proto::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("storage: {0}")]
    Storage(#[from] handoff_store::StoreError),
}

pub type BackendResult<T> = Result<T, BackendError>;
