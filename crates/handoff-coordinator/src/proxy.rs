use async_trait::async_trait;
use handoff_proto::{error_codes, WireMessage};
use handoff_transport::TransportClient;
use handoff_types::EntityId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// The entity cannot be safely suspended or resumed right now
    /// (mid-tick, loading). Worth retrying shortly.
    #[error("entity unavailable: {0}")]
    Unavailable(String),

    /// The proxy failed outright; retrying will not help.
    #[error("proxy failure: {0}")]
    Failed(String),

    /// This proxy does not implement the requested direction.
    #[error("unsupported proxy operation: {0}")]
    Unsupported(String),
}

impl ProxyError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProxyError::Unavailable(_))
    }
}

/// The engine-side representation of an entity.
///
/// These two calls are the entire contract between the core and the game
/// engine: the engine turns live gameplay state into an opaque payload and
/// back. The core never sees inside the payload.
#[async_trait]
pub trait EntityProxy: Send + Sync {
    /// Produce a serialized snapshot of the entity's current state,
    /// suspending it if necessary.
    async fn serialize(&self, entity: &EntityId) -> Result<Vec<u8>, ProxyError>;

    /// Restore the entity from a payload and resume it.
    async fn rehydrate(&self, entity: &EntityId, payload: &[u8]) -> Result<(), ProxyError>;
}

/// [`EntityProxy`] for an entity whose destination lives on another server.
///
/// `rehydrate` sends a handoff notice over the transport; the receiving
/// server spawns the entity from the inline payload (or fetches the stored
/// snapshot if the payload is omitted). `serialize` is unsupported;
/// snapshots are always taken at the source, which is local by definition.
pub struct RemoteEntityProxy {
    client: TransportClient,
}

impl RemoteEntityProxy {
    pub fn new(client: TransportClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EntityProxy for RemoteEntityProxy {
    async fn serialize(&self, entity: &EntityId) -> Result<Vec<u8>, ProxyError> {
        Err(ProxyError::Unsupported(format!(
            "cannot serialize {entity} through a remote proxy"
        )))
    }

    async fn rehydrate(&self, entity: &EntityId, payload: &[u8]) -> Result<(), ProxyError> {
        let notice = WireMessage::HandoffNotice {
            entity: entity.to_string(),
            payload: Some(payload.to_vec()),
        };
        let response = self
            .client
            .call(notice)
            .await
            .map_err(|e| ProxyError::Unavailable(e.to_string()))?;
        match response {
            WireMessage::HandoffAck { accepted: true, .. } => Ok(()),
            WireMessage::HandoffAck { accepted: false, .. } => Err(ProxyError::Failed(format!(
                "destination declined handoff of {entity}"
            ))),
            WireMessage::Error { code, message } if code == error_codes::INTERNAL => {
                Err(ProxyError::Unavailable(message))
            }
            WireMessage::Error { code, message } => {
                Err(ProxyError::Failed(format!("destination error {code}: {message}")))
            }
            other => Err(ProxyError::Failed(format!(
                "unexpected response to handoff notice: {}",
                other.type_name()
            ))),
        }
    }
}
