use super::{DnsTransport, TransportResponse};
use async_trait::async_trait;
use fanout_dns_domain::FanoutError;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// DNS over TCP with RFC 1035 §4.2.2 two-byte length framing.
///
/// Dials per call; concurrent sends against the same upstream each get
/// their own stream.
#[derive(Debug)]
pub struct TcpTransport {
    server_addr: SocketAddr,
}

impl TcpTransport {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self { server_addr }
    }

    async fn exchange(&self, message_bytes: &[u8]) -> Result<Vec<u8>, FanoutError> {
        let mut stream = TcpStream::connect(self.server_addr).await.map_err(|e| {
            FanoutError::Transport(format!("failed to connect to {}: {}", self.server_addr, e))
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
            FanoutError::Transport(format!("failed to send TCP query to {}: {}", self.server_addr, e))
        })?;

        let mut len_buf = [0u8; 2];
        stream.read_exact(&mut len_buf).await.map_err(|e| {
            FanoutError::Transport(format!(
                "failed to read TCP response length from {}: {}",
                self.server_addr, e
            ))
        })?;

        let response_len = u16::from_be_bytes(len_buf) as usize;
        let mut response = vec![0u8; response_len];
        stream.read_exact(&mut response).await.map_err(|e| {
            FanoutError::Transport(format!(
                "failed to read TCP response from {}: {}",
                self.server_addr, e
            ))
        })?;

        Ok(response)
    }
}

#[async_trait]
impl DnsTransport for TcpTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, FanoutError> {
        let bytes = tokio::time::timeout(timeout, self.exchange(message_bytes))
            .await
            .map_err(|_| {
                FanoutError::Transport(format!(
                    "timeout exchanging TCP query with {}",
                    self.server_addr
                ))
            })??;

        debug!(
            server = %self.server_addr,
            bytes_received = bytes.len(),
            "TCP response received"
        );

        Ok(TransportResponse {
            bytes,
            protocol_used: "TCP",
        })
    }

    fn protocol_name(&self) -> &'static str {
        "TCP"
    }
}
