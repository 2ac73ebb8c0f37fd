use crate::health::HealthProber;
use crate::selector::{ResponseSelector, Verdict};
use crate::upstream::{Upstream, UpstreamSet, UpstreamSetBuilder};
use crate::worker::{DispatchRun, WorkerPool};
use async_trait::async_trait;
use fanout_dns_domain::config::ConfigError;
use fanout_dns_domain::{FanoutConfig, FanoutError, HealthCheckConfig, UpstreamProtocol};
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::Name;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handler seam for the request-routing chain.
///
/// The fanout dispatcher is one link; queries outside its zone are
/// delegated to the next handler in the chain.
#[async_trait]
pub trait DnsHandler: Send + Sync {
    /// Serve one request: on a winning reply, invoke `writer` exactly once
    /// and return the written rcode; on failure, return the error without
    /// touching the writer.
    async fn serve(
        &self,
        cancel: &CancellationToken,
        writer: &dyn ResponseWriter,
        request: &Message,
    ) -> Result<ResponseCode, FanoutError>;
}

/// Sink for the single canonical response of a served request.
#[async_trait]
pub trait ResponseWriter: Send + Sync {
    async fn write_msg(&self, response: &Message) -> Result<(), FanoutError>;
}

/// Per-request progress, surfaced in log fields only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchState {
    Pending,
    Dispatching,
    Collecting,
    Resolved,
    Failed,
}

/// The fanout dispatcher.
///
/// Forwards each in-zone request to every configured upstream under the
/// worker bound, races the replies in completion order, and writes the
/// canonical response chosen by the [`ResponseSelector`].
///
/// Health state is advisory: the dispatch always attempts the full frozen
/// upstream set, whatever the prober currently believes.
pub struct Fanout {
    zone: Name,
    upstreams: UpstreamSet,
    pool: WorkerPool,
    attempt_timeout: Duration,
    request_deadline: Option<Duration>,
    prober: tokio::sync::Mutex<HealthProber>,
    next: Option<Arc<dyn DnsHandler>>,
}

impl std::fmt::Debug for Fanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fanout")
            .field("zone", &self.zone)
            .field("upstreams", &self.upstreams)
            .field("pool", &self.pool)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("request_deadline", &self.request_deadline)
            .finish_non_exhaustive()
    }
}

impl Fanout {
    pub fn builder() -> FanoutBuilder {
        FanoutBuilder::new()
    }

    pub fn from_config(config: &FanoutConfig) -> Result<Self, ConfigError> {
        let zone = Name::from_str(&config.from)
            .map_err(|e| ConfigError::InvalidZone(config.from.clone(), e.to_string()))?;

        let mut builder = FanoutBuilder::new()
            .zone(zone)
            .worker_count(config.worker_count)
            .attempt_timeout(config.timeout())
            .health_check(config.health_check.clone());

        if let Some(deadline) = config.request_deadline() {
            builder = builder.request_deadline(deadline);
        }

        for spec in &config.upstreams {
            builder = builder.upstream(UpstreamProtocol::parse_with_default(spec, &config.network)?);
        }

        builder.build()
    }

    pub fn upstreams(&self) -> &UpstreamSet {
        &self.upstreams
    }

    pub fn zone(&self) -> &Name {
        &self.zone
    }

    /// Launch the health probers. To be invoked exactly once by the host,
    /// after configuration and before serving.
    pub async fn start(&self) {
        info!(zone = %self.zone, upstreams = self.upstreams.len(), "fanout starting");
        self.prober.lock().await.start(&self.upstreams);
    }

    /// Stop the health probers and wait for them to exit. To be invoked
    /// exactly once by the host during shutdown.
    pub async fn stop(&self) {
        self.prober.lock().await.stop().await;
        info!(zone = %self.zone, "fanout stopped");
    }

    /// Drive the selector over streaming results until it short-circuits
    /// or every upstream has reported.
    async fn collect(run: &mut DispatchRun) -> Option<Message> {
        let mut selector = ResponseSelector::new();
        while let Some(result) = run.next_result().await {
            if let Verdict::Winner(reply) = selector.offer(result) {
                return Some(reply);
            }
        }
        debug!(
            reported = selector.reported(),
            state = ?DispatchState::Collecting,
            "all upstreams reported without a success reply"
        );
        selector.conclude()
    }
}

#[async_trait]
impl DnsHandler for Fanout {
    async fn serve(
        &self,
        cancel: &CancellationToken,
        writer: &dyn ResponseWriter,
        request: &Message,
    ) -> Result<ResponseCode, FanoutError> {
        let name = request
            .queries()
            .first()
            .map(|q| q.name().clone())
            .unwrap_or_else(Name::root);

        if !self.zone.zone_of(&name) {
            return match &self.next {
                Some(next) => next.serve(cancel, writer, request).await,
                None => Err(FanoutError::OutsideZone(self.zone.to_string())),
            };
        }

        debug!(
            query = %name,
            upstreams = self.upstreams.len(),
            workers = self.pool.worker_count(),
            state = ?DispatchState::Pending,
            "fanning out query"
        );

        let mut run = self
            .pool
            .dispatch(&self.upstreams, request, self.attempt_timeout);
        let attempted = run.total();
        debug!(attempted, state = ?DispatchState::Dispatching, "dispatch started");

        let request_deadline = self.request_deadline;
        let deadline = async move {
            match request_deadline {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending().await,
            }
        };

        // the only suspension point in the request path: wait for a
        // decision, full coverage, cancellation, or the deadline. Sends
        // still in flight afterwards run to completion detached and their
        // results are discarded.
        let winner = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(query = %name, state = ?DispatchState::Failed, "request canceled");
                return Err(FanoutError::Canceled);
            }
            _ = deadline => {
                debug!(query = %name, state = ?DispatchState::Failed, "request deadline expired");
                return Err(FanoutError::QueryTimeout);
            }
            winner = Self::collect(&mut run) => winner,
        };

        match winner {
            Some(mut reply) => {
                let mut header = *reply.header();
                header.set_id(request.id());
                reply.set_header(header);
                let rcode = reply.response_code();
                debug!(
                    query = %name,
                    rcode = ?rcode,
                    state = ?DispatchState::Resolved,
                    "writing canonical response"
                );
                // writer errors propagate unchanged
                writer.write_msg(&reply).await?;
                Ok(rcode)
            }
            None => {
                warn!(
                    query = %name,
                    attempted,
                    state = ?DispatchState::Failed,
                    "no upstream produced a well-formed reply"
                );
                Err(FanoutError::AllUpstreamsFailed { attempted })
            }
        }
    }
}

/// Builder for [`Fanout`]. Upstream registration is append-only; `build`
/// freezes the set.
pub struct FanoutBuilder {
    zone: Name,
    upstreams: UpstreamSetBuilder,
    worker_count: usize,
    attempt_timeout: Duration,
    request_deadline: Option<Duration>,
    health_check: HealthCheckConfig,
    next: Option<Arc<dyn DnsHandler>>,
}

impl FanoutBuilder {
    pub fn new() -> Self {
        Self {
            zone: Name::root(),
            upstreams: UpstreamSetBuilder::new(),
            worker_count: 0,
            attempt_timeout: Duration::from_millis(2000),
            request_deadline: None,
            health_check: HealthCheckConfig::default(),
            next: None,
        }
    }

    pub fn zone(mut self, zone: Name) -> Self {
        self.zone = zone;
        self
    }

    /// Append one upstream; insertion order is the claim order at dispatch
    /// time.
    pub fn upstream(mut self, protocol: UpstreamProtocol) -> Self {
        self.upstreams.push(Upstream::new(protocol));
        self
    }

    /// Worker bound; 0 means one worker per upstream.
    pub fn worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn request_deadline(mut self, deadline: Duration) -> Self {
        self.request_deadline = Some(deadline);
        self
    }

    pub fn health_check(mut self, config: HealthCheckConfig) -> Self {
        self.health_check = config;
        self
    }

    pub fn next_handler(mut self, next: Arc<dyn DnsHandler>) -> Self {
        self.next = Some(next);
        self
    }

    pub fn build(self) -> Result<Fanout, ConfigError> {
        let upstreams = self.upstreams.build()?;
        let workers = if self.worker_count == 0 {
            upstreams.len()
        } else {
            self.worker_count.min(upstreams.len()).max(1)
        };

        Ok(Fanout {
            zone: self.zone,
            upstreams,
            pool: WorkerPool::new(workers),
            attempt_timeout: self.attempt_timeout,
            request_deadline: self.request_deadline,
            prober: tokio::sync::Mutex::new(HealthProber::new(self.health_check)),
            next: self.next,
        })
    }
}

impl Default for FanoutBuilder {
    fn default() -> Self {
        Self::new()
    }
}
