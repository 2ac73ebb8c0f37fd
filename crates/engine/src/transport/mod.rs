pub mod tcp;
#[cfg(feature = "dns-over-rustls")]
pub mod tls;
pub mod udp;

use async_trait::async_trait;
use fanout_dns_domain::{FanoutError, UpstreamProtocol};
use std::time::Duration;

/// Result of a raw DNS transport exchange.
#[derive(Debug)]
pub struct TransportResponse {
    /// Raw DNS reply bytes (wire format)
    pub bytes: Vec<u8>,
    /// Which protocol was used
    pub protocol_used: &'static str,
}

/// Trait for sending raw DNS messages over the wire.
///
/// Implementations must be safe to invoke concurrently from multiple
/// in-flight requests against the same upstream; every transport here
/// dials per call, so concurrent sends never share a socket.
#[async_trait]
pub trait DnsTransport: Send + Sync {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, FanoutError>;

    fn protocol_name(&self) -> &'static str;
}

/// Enum-dispatched transport — stack-allocated, no Box/vtable overhead.
#[derive(Debug)]
pub enum Transport {
    Udp(udp::UdpTransport),
    Tcp(tcp::TcpTransport),
    #[cfg(feature = "dns-over-rustls")]
    Tls(tls::TlsTransport),
}

impl Transport {
    pub async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, FanoutError> {
        match self {
            Self::Udp(t) => DnsTransport::send(t, message_bytes, timeout).await,
            Self::Tcp(t) => DnsTransport::send(t, message_bytes, timeout).await,
            #[cfg(feature = "dns-over-rustls")]
            Self::Tls(t) => DnsTransport::send(t, message_bytes, timeout).await,
        }
    }

    /// Protocol name for logging.
    pub fn protocol_name(&self) -> &'static str {
        match self {
            Self::Udp(_) => "UDP",
            Self::Tcp(_) => "TCP",
            #[cfg(feature = "dns-over-rustls")]
            Self::Tls(_) => "TLS",
        }
    }
}

/// Create the appropriate transport for a given upstream protocol.
pub fn create_transport(protocol: &UpstreamProtocol) -> Transport {
    match protocol {
        UpstreamProtocol::Udp { addr } => Transport::Udp(udp::UdpTransport::new(*addr)),
        UpstreamProtocol::Tcp { addr } => Transport::Tcp(tcp::TcpTransport::new(*addr)),

        #[cfg(feature = "dns-over-rustls")]
        UpstreamProtocol::Tls { addr, hostname } => {
            Transport::Tls(tls::TlsTransport::new(*addr, hostname.to_string()))
        }

        #[cfg(not(feature = "dns-over-rustls"))]
        UpstreamProtocol::Tls { addr, .. } => {
            tracing::warn!("TLS feature not enabled, falling back to TCP for {}", addr);
            Transport::Tcp(tcp::TcpTransport::new(*addr))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_matches_protocol() {
        let udp: UpstreamProtocol = "8.8.8.8:53".parse().unwrap();
        assert_eq!(create_transport(&udp).protocol_name(), "UDP");

        let tcp: UpstreamProtocol = "tcp://8.8.8.8:53".parse().unwrap();
        assert_eq!(create_transport(&tcp).protocol_name(), "TCP");
    }

    #[cfg(feature = "dns-over-rustls")]
    #[test]
    fn tls_protocol_gets_tls_transport() {
        let tls: UpstreamProtocol = "tls://9.9.9.9:853#dns.quad9.net".parse().unwrap();
        assert_eq!(create_transport(&tls).protocol_name(), "TLS");
    }
}
