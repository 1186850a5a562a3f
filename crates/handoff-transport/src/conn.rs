use handoff_proto::{ProtocolError, WireCodec, WireMessage, FRAME_HEADER_LEN, PROTOCOL_VERSION};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::TransportConfig;
use crate::error::{classify_io, TransportError, TransportResult};

/// The underlying byte stream, plain or encrypted.
pub(crate) enum Stream {
    Plain(TcpStream),
    #[cfg(feature = "tls")]
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl Stream {
    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            Stream::Plain(s) => s.write_all(buf).await,
            #[cfg(feature = "tls")]
            Stream::Tls(s) => s.write_all(buf).await,
        }
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        match self {
            Stream::Plain(s) => s.read_exact(buf).await.map(|_| ()),
            #[cfg(feature = "tls")]
            Stream::Tls(s) => s.read_exact(buf).await.map(|_| ()),
        }
    }
}

/// One established, handshaken connection.
///
/// Never shared across concurrent calls: the pool hands a connection to
/// exactly one caller at a time.
pub(crate) struct Connection {
    endpoint: String,
    stream: Stream,
}

impl Connection {
    /// Connect, optionally wrap in TLS, and run the version handshake.
    pub(crate) async fn open(config: &TransportConfig) -> TransportResult<Self> {
        let tcp = TcpStream::connect(&config.endpoint)
            .await
            .map_err(|e| classify_io(&config.endpoint, e))?;
        let _ = tcp.set_nodelay(true);

        #[cfg(feature = "tls")]
        let stream = match &config.tls {
            Some(settings) => Stream::Tls(Box::new(crate::tls::wrap(tcp, settings).await?)),
            None => Stream::Plain(tcp),
        };
        #[cfg(not(feature = "tls"))]
        let stream = Stream::Plain(tcp);

        let mut conn = Self {
            endpoint: config.endpoint.clone(),
            stream,
        };
        conn.handshake().await?;
        Ok(conn)
    }

    async fn handshake(&mut self) -> TransportResult<()> {
        self.write_frame(&WireMessage::Hello { version: PROTOCOL_VERSION })
            .await?;
        match self.read_frame().await? {
            WireMessage::HelloAck { version } if version == PROTOCOL_VERSION => Ok(()),
            WireMessage::HelloAck { version } => {
                Err(ProtocolError::VersionMismatch {
                    local: PROTOCOL_VERSION,
                    remote: version,
                }
                .into())
            }
            other => Err(ProtocolError::Framing(format!(
                "expected HelloAck, got {}",
                other.type_name()
            ))
            .into()),
        }
    }

    /// One request/response exchange.
    pub(crate) async fn call(&mut self, msg: &WireMessage) -> TransportResult<WireMessage> {
        self.write_frame(msg).await?;
        self.read_frame().await
    }

    async fn write_frame(&mut self, msg: &WireMessage) -> TransportResult<()> {
        let frame = WireCodec::encode(msg)?;
        self.stream
            .write_all(&frame)
            .await
            .map_err(|e| classify_io(&self.endpoint, e))
    }

    async fn read_frame(&mut self) -> TransportResult<WireMessage> {
        let mut header_bytes = [0u8; FRAME_HEADER_LEN];
        self.stream
            .read_exact(&mut header_bytes)
            .await
            .map_err(|e| classify_io(&self.endpoint, e))?;
        let header = WireCodec::decode_header(&header_bytes)?;

        let mut payload = vec![0u8; header.payload_len];
        self.stream
            .read_exact(&mut payload)
            .await
            .map_err(|e| classify_io(&self.endpoint, e))?;
        Ok(WireCodec::decode_payload(header, &payload)?)
    }
}
