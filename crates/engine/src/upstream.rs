use crate::message;
use crate::transport::{create_transport, Transport};
use fanout_dns_domain::config::ConfigError;
use fanout_dns_domain::{FanoutError, UpstreamProtocol, UpstreamStatus};
use hickory_proto::op::Message;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Outcome of one upstream send within a dispatch.
///
/// Transport and protocol errors are equivalent for selection purposes:
/// neither contributes a candidate. They stay separate variants so the
/// per-upstream logs can tell a dead peer from a lying one.
#[derive(Debug)]
pub enum DispatchOutcome {
    Reply(Message),
    TransportError(FanoutError),
    ProtocolError(FanoutError),
}

impl DispatchOutcome {
    pub fn as_reply(&self) -> Option<&Message> {
        match self {
            Self::Reply(message) => Some(message),
            _ => None,
        }
    }
}

/// One completed send, tagged with the upstream that produced it and its
/// arrival rank within the dispatch (0 = first to complete).
#[derive(Debug)]
pub struct DispatchResult {
    pub index: usize,
    pub outcome: DispatchOutcome,
    pub rank: usize,
}

/// Point-in-time counters for one upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamStats {
    pub sent: u64,
    pub replies: u64,
    pub failures: u64,
}

/// A configured upstream resolver: address + transport, plus the health
/// cell and counters that live for the process lifetime.
///
/// The health cell is single-writer (the prober) and many-reader; the
/// request path never writes it.
#[derive(Debug)]
pub struct Upstream {
    protocol: UpstreamProtocol,
    transport: Transport,
    status: AtomicU8,
    last_probe_unix_ms: AtomicU64,
    sent: AtomicU64,
    replies: AtomicU64,
    failures: AtomicU64,
}

impl Upstream {
    pub fn new(protocol: UpstreamProtocol) -> Self {
        let transport = create_transport(&protocol);
        Self {
            protocol,
            transport,
            status: AtomicU8::new(UpstreamStatus::Unknown.as_u8()),
            last_probe_unix_ms: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            replies: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn protocol(&self) -> &UpstreamProtocol {
        &self.protocol
    }

    /// Send `request` to this upstream and correlate the reply.
    ///
    /// Each call re-encodes the request under a fresh transaction id and
    /// dials its own socket, so concurrent sends against the same upstream
    /// never interfere.
    pub async fn send(&self, request: &Message, deadline: Duration) -> DispatchOutcome {
        self.sent.fetch_add(1, Ordering::Relaxed);

        let (id, bytes) = match message::encode_query(request) {
            Ok(encoded) => encoded,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                return DispatchOutcome::ProtocolError(e);
            }
        };

        match self.transport.send(&bytes, deadline).await {
            Ok(response) => match message::decode_reply(&response.bytes, id, request) {
                Ok(reply) => {
                    self.replies.fetch_add(1, Ordering::Relaxed);
                    DispatchOutcome::Reply(reply)
                }
                Err(e) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    debug!(upstream = %self.protocol, error = %e, "discarding malformed reply");
                    DispatchOutcome::ProtocolError(e)
                }
            },
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                debug!(upstream = %self.protocol, error = %e, "upstream send failed");
                DispatchOutcome::TransportError(e)
            }
        }
    }

    /// One probe exchange. A well-formed, correlated reply of any rcode
    /// counts as alive.
    pub(crate) async fn probe(&self, domain: &str, deadline: Duration) -> Result<(), FanoutError> {
        let (probe, bytes) = message::build_probe_query(domain)?;
        let response = self.transport.send(&bytes, deadline).await?;
        message::decode_reply(&response.bytes, probe.id(), &probe)?;
        Ok(())
    }

    pub(crate) fn mark_healthy(&self) {
        self.record_probe(UpstreamStatus::Healthy);
    }

    pub(crate) fn mark_unhealthy(&self) {
        self.record_probe(UpstreamStatus::Unhealthy);
    }

    fn record_probe(&self, status: UpstreamStatus) {
        self.status.store(status.as_u8(), Ordering::Relaxed);
        self.last_probe_unix_ms
            .store(unix_millis_now(), Ordering::Relaxed);
    }

    pub fn health(&self) -> UpstreamStatus {
        UpstreamStatus::from_u8(self.status.load(Ordering::Relaxed))
    }

    /// When the prober last touched this upstream, if it ever has.
    pub fn last_probed_at(&self) -> Option<SystemTime> {
        match self.last_probe_unix_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(UNIX_EPOCH + Duration::from_millis(ms)),
        }
    }

    pub fn stats(&self) -> UpstreamStats {
        UpstreamStats {
            sent: self.sent.load(Ordering::Relaxed),
            replies: self.replies.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

fn unix_millis_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Append-only builder for the upstream set. Registration happens during
/// startup only; `build` freezes the set for the rest of the process
/// lifetime.
#[derive(Default)]
pub struct UpstreamSetBuilder {
    upstreams: Vec<Arc<Upstream>>,
}

impl UpstreamSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, upstream: Upstream) {
        self.upstreams.push(Arc::new(upstream));
    }

    pub fn build(self) -> Result<UpstreamSet, ConfigError> {
        if self.upstreams.is_empty() {
            return Err(ConfigError::NoUpstreams);
        }
        Ok(UpstreamSet {
            upstreams: self.upstreams.into(),
        })
    }
}

/// Frozen, insertion-ordered upstream set.
///
/// Built once during startup and shared by read-only reference across all
/// request tasks; no upstream is added, removed, or reordered while
/// requests are being served, so reads need no synchronization.
#[derive(Clone, Debug)]
pub struct UpstreamSet {
    upstreams: Arc<[Arc<Upstream>]>,
}

impl UpstreamSet {
    pub fn len(&self) -> usize {
        self.upstreams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upstreams.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Upstream>> {
        self.upstreams.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Upstream>> {
        self.upstreams.iter()
    }

    /// Health snapshot for observability, in insertion order.
    pub fn health_report(&self) -> Vec<(String, UpstreamStatus)> {
        self.upstreams
            .iter()
            .map(|u| (u.protocol().to_string(), u.health()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(specs: &[&str]) -> UpstreamSet {
        let mut builder = UpstreamSetBuilder::new();
        for spec in specs {
            builder.push(Upstream::new(spec.parse().unwrap()));
        }
        builder.build().unwrap()
    }

    #[test]
    fn set_preserves_insertion_order() {
        let specs = ["10.0.0.1:53", "tcp://10.0.0.2:53", "10.0.0.3:53"];
        let set = set_of(&specs);

        let listed: Vec<String> = set.iter().map(|u| u.protocol().to_string()).collect();
        assert_eq!(
            listed,
            vec!["udp://10.0.0.1:53", "tcp://10.0.0.2:53", "udp://10.0.0.3:53"]
        );
    }

    #[test]
    fn empty_set_is_rejected() {
        let err = UpstreamSetBuilder::new().build().unwrap_err();
        assert!(matches!(err, ConfigError::NoUpstreams));
    }

    #[test]
    fn health_starts_unknown_and_follows_probe_marks() {
        let upstream = Upstream::new("10.0.0.1:53".parse().unwrap());
        assert_eq!(upstream.health(), UpstreamStatus::Unknown);
        assert_eq!(upstream.last_probed_at(), None);

        upstream.mark_healthy();
        assert_eq!(upstream.health(), UpstreamStatus::Healthy);
        assert!(upstream.last_probed_at().is_some());

        upstream.mark_unhealthy();
        assert_eq!(upstream.health(), UpstreamStatus::Unhealthy);
    }

    #[test]
    fn stats_start_at_zero() {
        let upstream = Upstream::new("10.0.0.1:53".parse().unwrap());
        assert_eq!(
            upstream.stats(),
            UpstreamStats {
                sent: 0,
                replies: 0,
                failures: 0
            }
        );
    }

    #[test]
    fn health_report_covers_every_upstream() {
        let set = set_of(&["10.0.0.1:53", "10.0.0.2:53"]);
        set.get(1).unwrap().mark_healthy();

        let report = set.health_report();
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].1, UpstreamStatus::Unknown);
        assert_eq!(report[1].1, UpstreamStatus::Healthy);
    }
}
