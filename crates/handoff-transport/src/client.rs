use std::sync::Arc;

use handoff_proto::WireMessage;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};

use crate::config::TransportConfig;
use crate::conn::Connection;
use crate::error::{TransportError, TransportResult};

struct PoolInner {
    config: TransportConfig,
    /// Bounds total connections in flight plus idle.
    permits: Semaphore,
    idle: Mutex<Vec<Connection>>,
}

/// Pooled request/response client for one endpoint.
///
/// Cheap to clone; clones share the pool. Connections are established
/// lazily on first use.
#[derive(Clone)]
pub struct TransportClient {
    inner: Arc<PoolInner>,
}

impl TransportClient {
    pub fn new(config: TransportConfig) -> Self {
        let permits = Semaphore::new(config.pool_size.max(1));
        Self {
            inner: Arc::new(PoolInner {
                config,
                permits,
                idle: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Send one request and await its response, within the configured
    /// per-call timeout. The timeout covers the entire call: when no idle
    /// connection is pooled it also bounds connection establishment and the
    /// handshake, so a peer that accepts TCP but never answers cannot wedge
    /// the caller.
    ///
    /// Transient failures (timeout, refused, closed mid-call) are retried on
    /// a fresh connection up to `call_retries` times. Protocol errors are
    /// returned immediately: they mean the peer speaks a different framing
    /// or version, and retrying cannot help.
    pub async fn call(&self, msg: WireMessage) -> TransportResult<WireMessage> {
        let _permit = self
            .inner
            .permits
            .acquire()
            .await
            .expect("transport pool semaphore closed");

        let timeout = self.inner.config.call_timeout();
        let mut attempt: u32 = 0;
        loop {
            let exchange = async {
                let mut conn = self.checkout().await?;
                let response = conn.call(&msg).await?;
                Ok::<_, TransportError>((conn, response))
            };
            match tokio::time::timeout(timeout, exchange).await {
                Ok(Ok((conn, response))) => {
                    debug!(request = msg.type_name(), response = response.type_name(), "call ok");
                    self.checkin(conn).await;
                    return Ok(response);
                }
                Ok(Err(err)) if err.is_retryable() && attempt < self.inner.config.call_retries => {
                    attempt += 1;
                    warn!(
                        request = msg.type_name(),
                        attempt,
                        error = %err,
                        "transport call failed, retrying on a fresh connection"
                    );
                    // Connection state is unknown after a failure; drop it.
                }
                Ok(Err(err)) => {
                    if !err.is_retryable() {
                        warn!(request = msg.type_name(), error = %err, "protocol failure, not retrying");
                    }
                    return Err(err);
                }
                Err(_elapsed) => {
                    // Whatever stage the attempt was in is abandoned; a late
                    // response could still arrive on a half-open connection,
                    // so nothing from this attempt is reused.
                    if attempt < self.inner.config.call_retries {
                        attempt += 1;
                        warn!(request = msg.type_name(), attempt, "call timed out, retrying");
                        continue;
                    }
                    return Err(TransportError::Timeout(timeout));
                }
            }
        }
    }

    /// Pop an idle connection or establish a new one with capped attempts.
    async fn checkout(&self) -> TransportResult<Connection> {
        if let Some(conn) = self.inner.idle.lock().await.pop() {
            return Ok(conn);
        }

        let config = &self.inner.config;
        let mut last_err: Option<TransportError> = None;
        for attempt in 0..config.connect_attempts.max(1) {
            if attempt > 0 {
                tokio::time::sleep(config.connect_backoff()).await;
            }
            match Connection::open(config).await {
                Ok(conn) => return Ok(conn),
                Err(err) if err.is_retryable() => {
                    debug!(endpoint = %config.endpoint, attempt, error = %err, "connect failed");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| TransportError::Closed("connect never attempted".into())))
    }

    async fn checkin(&self, conn: Connection) {
        let mut idle = self.inner.idle.lock().await;
        if idle.len() < self.inner.config.pool_size {
            idle.push(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_proto::{
        ProtocolError, WireCodec, WireMessage, FRAME_HEADER_LEN, PROTOCOL_VERSION,
    };
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn read_frame(stream: &mut TcpStream) -> WireMessage {
        let mut header = [0u8; FRAME_HEADER_LEN];
        stream.read_exact(&mut header).await.unwrap();
        let parsed = WireCodec::decode_header(&header).unwrap();
        let mut payload = vec![0u8; parsed.payload_len];
        stream.read_exact(&mut payload).await.unwrap();
        WireCodec::decode_payload(parsed, &payload).unwrap()
    }

    async fn write_frame(stream: &mut TcpStream, msg: &WireMessage) {
        stream.write_all(&WireCodec::encode(msg).unwrap()).await.unwrap();
    }

    /// Minimal peer: answers the handshake, then echoes every Get as an
    /// empty GetResponse.
    async fn spawn_stub_peer(ack_version: u32) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => return,
                };
                tokio::spawn(async move {
                    match read_frame(&mut stream).await {
                        WireMessage::Hello { .. } => {
                            write_frame(&mut stream, &WireMessage::HelloAck { version: ack_version })
                                .await;
                        }
                        _ => return,
                    }
                    loop {
                        match read_frame(&mut stream).await {
                            WireMessage::GetRequest { .. } => {
                                write_frame(&mut stream, &WireMessage::GetResponse { entry: None })
                                    .await;
                            }
                            _ => return,
                        }
                    }
                });
            }
        });
        addr
    }

    fn quick_config(endpoint: String) -> TransportConfig {
        TransportConfig {
            endpoint,
            pool_size: 2,
            call_timeout_ms: 2_000,
            call_retries: 1,
            connect_attempts: 2,
            connect_backoff_ms: 10,
            #[cfg(feature = "tls")]
            tls: None,
        }
    }

    #[tokio::test]
    async fn call_roundtrips_through_the_pool() {
        let addr = spawn_stub_peer(PROTOCOL_VERSION).await;
        let client = TransportClient::new(quick_config(addr));

        for _ in 0..3 {
            let response = client
                .call(WireMessage::GetRequest { key: "state/player.e1".into() })
                .await
                .unwrap();
            assert_eq!(response, WireMessage::GetResponse { entry: None });
        }
    }

    #[tokio::test]
    async fn version_mismatch_is_fatal() {
        let addr = spawn_stub_peer(99).await;
        let client = TransportClient::new(quick_config(addr));

        let err = client
            .call(WireMessage::GetRequest { key: "k".into() })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Protocol(ProtocolError::VersionMismatch { remote: 99, .. })
        ));
    }

    #[tokio::test]
    async fn handshake_stall_times_out() {
        // Accepts connections and then says nothing: the client must not
        // wedge waiting for a HelloAck that never comes.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => held.push(stream),
                    Err(_) => return,
                }
            }
        });

        let mut config = quick_config(addr);
        config.call_timeout_ms = 100;
        config.call_retries = 0;
        let client = TransportClient::new(config);

        let err = client
            .call(WireMessage::GetRequest { key: "k".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[tokio::test]
    async fn stalled_connection_times_out_mid_call() {
        // Completes the handshake, then swallows every request.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            match read_frame(&mut stream).await {
                WireMessage::Hello { .. } => {
                    write_frame(&mut stream, &WireMessage::HelloAck { version: PROTOCOL_VERSION })
                        .await;
                }
                _ => return,
            }
            let mut sink = [0u8; 1024];
            loop {
                match stream.read(&mut sink).await {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {} // keep the connection open, never answer
                }
            }
        });

        let mut config = quick_config(addr);
        config.call_timeout_ms = 100;
        config.call_retries = 0;
        let client = TransportClient::new(config);

        let err = client
            .call(WireMessage::GetRequest { key: "k".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[tokio::test]
    async fn connection_refused_surfaces_after_capped_attempts() {
        // Bind-then-drop to find a port with no listener.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = TransportClient::new(quick_config(addr));
        let err = client
            .call(WireMessage::GetRequest { key: "k".into() })
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
