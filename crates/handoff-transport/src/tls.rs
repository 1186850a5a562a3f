use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::config::TlsSettings;
use crate::error::{TransportError, TransportResult};

/// Wrap a fresh TCP stream in a client-side TLS session.
pub(crate) async fn wrap(
    tcp: TcpStream,
    settings: &TlsSettings,
) -> TransportResult<TlsStream<TcpStream>> {
    let pem = tokio::fs::read(&settings.ca_path)
        .await
        .map_err(|e| TransportError::Tls(format!("reading {}: {e}", settings.ca_path.display())))?;

    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
        let cert = cert.map_err(|e| TransportError::Tls(format!("parsing CA bundle: {e}")))?;
        roots
            .add(cert)
            .map_err(|e| TransportError::Tls(format!("adding CA certificate: {e}")))?;
    }
    if roots.is_empty() {
        return Err(TransportError::Tls(format!(
            "no certificates found in {}",
            settings.ca_path.display()
        )));
    }

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let name = ServerName::try_from(settings.server_name.clone())
        .map_err(|e| TransportError::Tls(format!("invalid server name: {e}")))?;

    connector
        .connect(name, tcp)
        .await
        .map_err(|e| TransportError::Tls(e.to_string()))
}
