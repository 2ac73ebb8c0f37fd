use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(String),

    #[error("failed to parse config file: {0}")]
    Parse(String),

    #[error("invalid upstream '{0}': {1}")]
    InvalidUpstream(String, String),

    #[error("invalid zone '{0}': {1}")]
    InvalidZone(String, String),

    #[error("no upstream endpoints configured")]
    NoUpstreams,
}
