use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::ConfigError;
use super::health::HealthCheckConfig;

/// Fanout dispatcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FanoutConfig {
    /// Zone the dispatcher is authoritative for; queries outside it are
    /// delegated to the next handler. Default: "." (everything).
    #[serde(default = "default_from")]
    pub from: String,

    /// Ordered upstream resolvers, e.g. `"1.1.1.1:53"` or
    /// `"tls://9.9.9.9:853#dns.quad9.net"`. Order is preserved for the
    /// lifetime of the process.
    #[serde(default)]
    pub upstreams: Vec<String>,

    /// Maximum concurrent sends per dispatch. 0 means one worker per
    /// upstream.
    #[serde(default)]
    pub worker_count: usize,

    /// Transport for upstream entries without an explicit scheme.
    #[serde(default = "default_network")]
    pub network: String,

    /// Per-attempt send timeout in milliseconds (default: 2000).
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Overall per-request deadline in milliseconds. 0 disables the
    /// deadline: the dispatch runs until a decision or every upstream
    /// reports. Must exceed `timeout * ceil(upstreams / workers)` to
    /// leave every upstream a chance to be attempted.
    #[serde(default)]
    pub request_deadline: u64,

    #[serde(default)]
    pub health_check: HealthCheckConfig,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            from: default_from(),
            upstreams: vec![],
            worker_count: 0,
            network: default_network(),
            timeout: default_timeout(),
            request_deadline: 0,
            health_check: HealthCheckConfig::default(),
        }
    }
}

impl FanoutConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Effective worker bound for a set of `upstream_count` endpoints:
    /// at least 1, never more than the set size.
    pub fn resolved_worker_count(&self, upstream_count: usize) -> usize {
        let requested = if self.worker_count == 0 {
            upstream_count
        } else {
            self.worker_count.min(upstream_count)
        };
        requested.max(1)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    pub fn request_deadline(&self) -> Option<Duration> {
        if self.request_deadline == 0 {
            None
        } else {
            Some(Duration::from_millis(self.request_deadline))
        }
    }
}

fn default_from() -> String {
    ".".to_string()
}

fn default_network() -> String {
    "udp".to_string()
}

fn default_timeout() -> u64 {
    2000
}
