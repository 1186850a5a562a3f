use async_trait::async_trait;
use handoff_proto::{error_codes, WireMessage, WirePutOutcome};
use handoff_transport::TransportClient;
use handoff_types::Version;

use crate::backend::{KvBackend, PutOutcome, Versioned};
use crate::error::{StoreError, StoreResult};

/// [`KvBackend`] implementation over the pooled transport.
///
/// Pure translation layer: wire entries in, typed results out. Retry policy
/// lives above in [`crate::StateStore`]; reconnection lives below in the
/// transport.
#[derive(Clone)]
pub struct RemoteKv {
    client: TransportClient,
}

impl RemoteKv {
    pub fn new(client: TransportClient) -> Self {
        Self { client }
    }

    fn remote_error(code: u32, message: String) -> StoreError {
        match code {
            // The backend failed internally; the request may succeed later.
            error_codes::INTERNAL => StoreError::Unavailable(message),
            _ => StoreError::Protocol(format!("backend rejected request: code={code}, {message}")),
        }
    }

    fn unexpected(context: &str, msg: WireMessage) -> StoreError {
        StoreError::Protocol(format!("unexpected response to {context}: {}", msg.type_name()))
    }
}

#[async_trait]
impl KvBackend for RemoteKv {
    async fn get(&self, key: &str) -> StoreResult<Option<Versioned>> {
        let response = self
            .client
            .call(WireMessage::GetRequest { key: key.to_string() })
            .await?;
        match response {
            WireMessage::GetResponse { entry } => Ok(entry.map(|e| Versioned {
                version: Version::new(e.version),
                bytes: e.bytes,
            })),
            WireMessage::Error { code, message } => Err(Self::remote_error(code, message)),
            other => Err(Self::unexpected("GetRequest", other)),
        }
    }

    async fn put(&self, key: &str, version: Version, bytes: Vec<u8>) -> StoreResult<PutOutcome> {
        let response = self
            .client
            .call(WireMessage::PutRequest {
                key: key.to_string(),
                version: version.get(),
                bytes,
            })
            .await?;
        match response {
            WireMessage::PutResponse { outcome } => Ok(match outcome {
                WirePutOutcome::Stored => PutOutcome::Stored,
                WirePutOutcome::VersionConflict { stored } => PutOutcome::VersionConflict {
                    stored: Version::new(stored),
                },
            }),
            WireMessage::Error { code, message } => Err(Self::remote_error(code, message)),
            other => Err(Self::unexpected("PutRequest", other)),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let response = self
            .client
            .call(WireMessage::DeleteRequest { key: key.to_string() })
            .await?;
        match response {
            WireMessage::DeleteResponse { existed } => Ok(existed),
            WireMessage::Error { code, message } => Err(Self::remote_error(code, message)),
            other => Err(Self::unexpected("DeleteRequest", other)),
        }
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<(String, Version)>> {
        let response = self
            .client
            .call(WireMessage::ListRequest { prefix: prefix.to_string() })
            .await?;
        match response {
            WireMessage::ListResponse { entries } => Ok(entries
                .into_iter()
                .map(|(key, version)| (key, Version::new(version)))
                .collect()),
            WireMessage::Error { code, message } => Err(Self::remote_error(code, message)),
            other => Err(Self::unexpected("ListRequest", other)),
        }
    }
}
