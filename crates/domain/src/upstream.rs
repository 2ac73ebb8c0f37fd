use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::ConfigError;

/// Address and transport of one configured upstream resolver.
///
/// Accepted syntax:
/// - `1.1.1.1:53` — bare socket address, transport taken from the
///   configured default network (udp unless overridden)
/// - `udp://1.1.1.1:53`
/// - `tcp://1.1.1.1:53`
/// - `tls://9.9.9.9:853#dns.quad9.net` — the fragment names the
///   certificate hostname; without it the literal IP is used, which only
///   works for certificates carrying an IP SAN
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UpstreamProtocol {
    Udp { addr: SocketAddr },
    Tcp { addr: SocketAddr },
    Tls { addr: SocketAddr, hostname: Arc<str> },
}

impl UpstreamProtocol {
    /// Parse an upstream spec, falling back to `default_network` for
    /// schemeless entries.
    pub fn parse_with_default(spec: &str, default_network: &str) -> Result<Self, ConfigError> {
        let (scheme, rest) = match spec.split_once("://") {
            Some((scheme, rest)) => (scheme, rest),
            None => (default_network, spec),
        };

        match scheme {
            "udp" => Ok(Self::Udp {
                addr: parse_addr(spec, rest)?,
            }),
            "tcp" => Ok(Self::Tcp {
                addr: parse_addr(spec, rest)?,
            }),
            "tls" => {
                let (addr_part, hostname) = match rest.split_once('#') {
                    Some((addr, hostname)) => (addr, Some(hostname)),
                    None => (rest, None),
                };
                let addr = parse_addr(spec, addr_part)?;
                let hostname: Arc<str> = match hostname {
                    Some(h) if !h.is_empty() => Arc::from(h),
                    _ => Arc::from(addr.ip().to_string().as_str()),
                };
                Ok(Self::Tls { addr, hostname })
            }
            other => Err(ConfigError::InvalidUpstream(
                spec.to_string(),
                format!("unsupported transport '{}'", other),
            )),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        match self {
            Self::Udp { addr } | Self::Tcp { addr } | Self::Tls { addr, .. } => *addr,
        }
    }
}

fn parse_addr(spec: &str, addr: &str) -> Result<SocketAddr, ConfigError> {
    addr.parse::<SocketAddr>()
        .map_err(|e| ConfigError::InvalidUpstream(spec.to_string(), e.to_string()))
}

impl FromStr for UpstreamProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with_default(s, "udp")
    }
}

impl fmt::Display for UpstreamProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp { addr } => write!(f, "udp://{}", addr),
            Self::Tcp { addr } => write!(f, "tcp://{}", addr),
            Self::Tls { addr, hostname } => write!(f, "tls://{}#{}", addr, hostname),
        }
    }
}
