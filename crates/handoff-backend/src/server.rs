use std::net::SocketAddr;
use std::sync::Arc;

use handoff_proto::{
    error_codes, FrameHeader, WireCodec, WireEntry, WireMessage, WirePutOutcome,
    FRAME_HEADER_LEN, PROTOCOL_VERSION,
};
use handoff_store::{KvBackend, MemoryKv, PutOutcome, StoreError};
use handoff_types::Version;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::error::BackendResult;

/// Reference Handoff backend: versioned key-value storage behind the framed
/// wire protocol.
///
/// One task per connection; a handshake pins the protocol version, then the
/// session loop answers requests until the client hangs up. Any framing
/// error closes the connection, since a desynchronized stream cannot be
/// re-synchronized.
pub struct Backend {
    listener: TcpListener,
    kv: Arc<dyn KvBackend>,
    connections: Arc<Semaphore>,
}

impl Backend {
    /// Bind with a fresh in-memory store.
    pub async fn bind(config: BackendConfig) -> BackendResult<Self> {
        Self::bind_with(config, Arc::new(MemoryKv::new())).await
    }

    /// Bind over an existing store, for embedding and tests.
    pub async fn bind_with(config: BackendConfig, kv: Arc<dyn KvBackend>) -> BackendResult<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        info!(addr = %listener.local_addr()?, "backend listening");
        Ok(Self {
            listener,
            kv,
            connections: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// The bound address, useful when binding to port 0.
    pub fn local_addr(&self) -> BackendResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Runs until the task is dropped or the listener fails.
    pub async fn serve(self) -> BackendResult<()> {
        loop {
            let permit = self
                .connections
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore never closed");
            let (stream, peer) = self.listener.accept().await?;
            let kv = self.kv.clone();
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(err) = session(stream, kv).await {
                    debug!(%peer, error = %err, "session ended with error");
                }
            });
        }
    }
}

/// Serve one client: handshake, then request/response until EOF.
async fn session(mut stream: TcpStream, kv: Arc<dyn KvBackend>) -> BackendResult<()> {
    stream.set_nodelay(true)?;

    match read_frame(&mut stream).await? {
        Some(WireMessage::Hello { version }) if version == PROTOCOL_VERSION => {
            write_frame(&mut stream, &WireMessage::HelloAck { version: PROTOCOL_VERSION }).await?;
        }
        Some(WireMessage::Hello { version }) => {
            warn!(client_version = version, "rejecting incompatible client");
            let reply = WireMessage::Error {
                code: error_codes::UNSUPPORTED,
                message: format!("protocol version {version} unsupported, want {PROTOCOL_VERSION}"),
            };
            write_frame(&mut stream, &reply).await?;
            return Ok(());
        }
        Some(other) => {
            let reply = WireMessage::Error {
                code: error_codes::MALFORMED,
                message: format!("expected Hello, got {}", other.type_name()),
            };
            write_frame(&mut stream, &reply).await?;
            return Ok(());
        }
        None => return Ok(()),
    }

    while let Some(request) = read_frame(&mut stream).await? {
        let response = dispatch(request, kv.as_ref()).await;
        write_frame(&mut stream, &response).await?;
    }
    Ok(())
}

async fn dispatch(request: WireMessage, kv: &dyn KvBackend) -> WireMessage {
    match request {
        WireMessage::GetRequest { key } => match kv.get(&key).await {
            Ok(entry) => WireMessage::GetResponse {
                entry: entry.map(|v| WireEntry {
                    version: v.version.get(),
                    bytes: v.bytes,
                }),
            },
            Err(err) => storage_error(err),
        },
        WireMessage::PutRequest { key, version, bytes } => {
            match kv.put(&key, Version::new(version), bytes).await {
                Ok(PutOutcome::Stored) => WireMessage::PutResponse {
                    outcome: WirePutOutcome::Stored,
                },
                Ok(PutOutcome::VersionConflict { stored }) => WireMessage::PutResponse {
                    outcome: WirePutOutcome::VersionConflict { stored: stored.get() },
                },
                Err(err) => storage_error(err),
            }
        }
        WireMessage::DeleteRequest { key } => match kv.delete(&key).await {
            Ok(existed) => WireMessage::DeleteResponse { existed },
            Err(err) => storage_error(err),
        },
        WireMessage::ListRequest { prefix } => match kv.list(&prefix).await {
            Ok(entries) => WireMessage::ListResponse {
                entries: entries
                    .into_iter()
                    .map(|(key, version)| (key, version.get()))
                    .collect(),
            },
            Err(err) => storage_error(err),
        },
        // Handoff notices are addressed to game servers, not storage.
        WireMessage::HandoffNotice { entity, .. } => WireMessage::Error {
            code: error_codes::UNSUPPORTED,
            message: format!("storage backend cannot host entity {entity}"),
        },
        other => WireMessage::Error {
            code: error_codes::MALFORMED,
            message: format!("unexpected request: {}", other.type_name()),
        },
    }
}

fn storage_error(err: StoreError) -> WireMessage {
    WireMessage::Error {
        code: error_codes::INTERNAL,
        message: err.to_string(),
    }
}

/// Read one frame; `Ok(None)` on clean end-of-stream at a frame boundary.
async fn read_frame(stream: &mut TcpStream) -> BackendResult<Option<WireMessage>> {
    let mut header_bytes = [0u8; FRAME_HEADER_LEN];
    match stream.read_exact(&mut header_bytes).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }
    let header: FrameHeader = WireCodec::decode_header(&header_bytes)?;
    let mut payload = vec![0u8; header.payload_len];
    stream.read_exact(&mut payload).await?;
    let msg = WireCodec::decode_payload(header, &payload)?;
    Ok(Some(msg))
}

async fn write_frame(stream: &mut TcpStream, msg: &WireMessage) -> BackendResult<()> {
    let frame = WireCodec::encode(msg)?;
    stream.write_all(&frame).await?;
    Ok(())
}
