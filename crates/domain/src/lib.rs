//! Fanout DNS Domain Layer
pub mod config;
pub mod errors;
pub mod health;
pub mod upstream;

pub use config::{ConfigError, FanoutConfig, HealthCheckConfig};
pub use errors::FanoutError;
pub use health::UpstreamStatus;
pub use upstream::UpstreamProtocol;
