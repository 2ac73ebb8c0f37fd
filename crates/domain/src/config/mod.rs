//! Configuration for the fanout dispatcher.
//!
//! - `fanout`: zone filter, upstream list, worker bound, deadlines
//! - `health`: probe cadence for the background health prober
//! - `errors`: configuration errors

pub mod errors;
pub mod fanout;
pub mod health;

pub use errors::ConfigError;
pub use fanout::FanoutConfig;
pub use health::HealthCheckConfig;
