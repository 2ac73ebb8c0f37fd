use serde::{Deserialize, Serialize};

/// Probe cadence for upstream liveness tracking.
///
/// A single well-formed reply of any rcode marks an upstream healthy; a
/// single timeout or connection failure marks it unhealthy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthCheckConfig {
    /// Interval between probes in seconds (default: 30)
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Probe timeout in milliseconds (default: 2000)
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Name queried by the probe (default: the root zone)
    #[serde(default = "default_probe_domain")]
    pub probe_domain: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            timeout: default_timeout(),
            probe_domain: default_probe_domain(),
        }
    }
}

fn default_interval() -> u64 {
    30
}

fn default_timeout() -> u64 {
    2000
}

fn default_probe_domain() -> String {
    ".".to_string()
}
