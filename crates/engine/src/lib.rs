//! Fanout DNS Engine
//!
//! Concurrent query dispatcher: one inbound DNS request is sent to every
//! configured upstream resolver under a bounded worker count, the replies
//! are raced in completion order, and a single canonical response is
//! selected with a success-biased policy.

pub mod fanout;
pub mod health;
pub mod message;
pub mod selector;
pub mod transport;
pub mod upstream;
pub mod worker;

pub use fanout::{DnsHandler, Fanout, FanoutBuilder, ResponseWriter};
pub use health::HealthProber;
pub use selector::{ResponseSelector, Verdict};
pub use upstream::{
    DispatchOutcome, DispatchResult, Upstream, UpstreamSet, UpstreamSetBuilder, UpstreamStats,
};
pub use worker::{DispatchRun, WorkerPool};
