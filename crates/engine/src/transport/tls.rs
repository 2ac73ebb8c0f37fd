use super::{DnsTransport, TransportResponse};
use async_trait::async_trait;
use fanout_dns_domain::FanoutError;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::net::SocketAddr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Shared client config with the webpki trust anchors, built once.
static TLS_CONFIG: LazyLock<Arc<ClientConfig>> = LazyLock::new(|| {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    Arc::new(
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
});

/// DNS over TLS (RFC 7858), same two-byte length framing as plain TCP.
///
/// Dials and handshakes per call. The session cache in the shared
/// `ClientConfig` keeps repeat handshakes to the same upstream cheap.
#[derive(Debug)]
pub struct TlsTransport {
    server_addr: SocketAddr,
    hostname: String,
}

impl TlsTransport {
    pub fn new(server_addr: SocketAddr, hostname: String) -> Self {
        Self {
            server_addr,
            hostname,
        }
    }

    async fn exchange(&self, message_bytes: &[u8]) -> Result<Vec<u8>, FanoutError> {
        let server_name = ServerName::try_from(self.hostname.clone()).map_err(|e| {
            FanoutError::Transport(format!("invalid TLS server name '{}': {}", self.hostname, e))
        })?;

        let tcp = TcpStream::connect(self.server_addr).await.map_err(|e| {
            FanoutError::Transport(format!("failed to connect to {}: {}", self.server_addr, e))
        })?;

        let connector = TlsConnector::from(Arc::clone(&TLS_CONFIG));
        let mut stream = connector.connect(server_name, tcp).await.map_err(|e| {
            FanoutError::Transport(format!(
                "TLS handshake with {} ({}) failed: {}",
                self.server_addr, self.hostname, e
            ))
        })?;

        let len = u16::try_from(message_bytes.len()).map_err(|_| {
            FanoutError::InvalidMessage(format!(
                "DNS message of {} bytes exceeds TCP frame limit",
                message_bytes.len()
            ))
        })?;

        let mut framed = Vec::with_capacity(2 + message_bytes.len());
        framed.extend_from_slice(&len.to_be_bytes());
        framed.extend_from_slice(message_bytes);

        stream.write_all(&framed).await.map_err(|e| {
            FanoutError::Transport(format!("failed to send TLS query to {}: {}", self.server_addr, e))
        })?;

        let mut len_buf = [0u8; 2];
        stream.read_exact(&mut len_buf).await.map_err(|e| {
            FanoutError::Transport(format!(
                "failed to read TLS response length from {}: {}",
                self.server_addr, e
            ))
        })?;

        let response_len = u16::from_be_bytes(len_buf) as usize;
        let mut response = vec![0u8; response_len];
        stream.read_exact(&mut response).await.map_err(|e| {
            FanoutError::Transport(format!(
                "failed to read TLS response from {}: {}",
                self.server_addr, e
            ))
        })?;

        Ok(response)
    }
}

#[async_trait]
impl DnsTransport for TlsTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, FanoutError> {
        let bytes = tokio::time::timeout(timeout, self.exchange(message_bytes))
            .await
            .map_err(|_| {
                FanoutError::Transport(format!(
                    "timeout exchanging TLS query with {}",
                    self.server_addr
                ))
            })??;

        debug!(
            server = %self.server_addr,
            hostname = %self.hostname,
            bytes_received = bytes.len(),
            "TLS response received"
        );

        Ok(TransportResponse {
            bytes,
            protocol_used: "TLS",
        })
    }

    fn protocol_name(&self) -> &'static str {
        "TLS"
    }
}
