use thiserror::Error;

/// Failures surfaced by the dispatch engine.
///
/// Individual upstream failures (`Transport`, `Protocol`) are absorbed at the
/// fan-out boundary and never reach the caller on their own; the caller only
/// sees `AllUpstreamsFailed` when no upstream produced a well-formed reply.
/// Cancellation and deadline expiry stay distinct variants so diagnostics can
/// tell them apart from upstream trouble.
#[derive(Error, Debug)]
pub enum FanoutError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("all {attempted} upstreams failed to produce a reply")]
    AllUpstreamsFailed { attempted: usize },

    #[error("request canceled by caller")]
    Canceled,

    #[error("request deadline expired")]
    QueryTimeout,

    #[error("invalid DNS message: {0}")]
    InvalidMessage(String),

    #[error("query name outside zone {0} and no next handler configured")]
    OutsideZone(String),

    #[error("I/O error: {0}")]
    Io(String),
}
