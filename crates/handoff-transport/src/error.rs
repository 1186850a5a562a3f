use std::time::Duration;

use handoff_proto::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection refused by {0}")]
    ConnectionRefused(String),

    #[error("connection closed: {0}")]
    Closed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing or version mismatch with the peer. Fatal: retrying the same
    /// bytes against the same peer cannot succeed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[cfg(feature = "tls")]
    #[error("tls error: {0}")]
    Tls(String),
}

impl TransportError {
    /// Transient failures may be retried on a fresh connection; protocol
    /// errors may not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Protocol(_))
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Classify an I/O error from connect/read/write into a transport failure.
pub(crate) fn classify_io(endpoint: &str, err: std::io::Error) -> TransportError {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::ConnectionRefused => TransportError::ConnectionRefused(endpoint.to_string()),
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe => TransportError::Closed(err.to_string()),
        _ => TransportError::Io(err),
    }
}
