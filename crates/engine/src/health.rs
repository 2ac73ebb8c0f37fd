use crate::upstream::{Upstream, UpstreamSet};
use fanout_dns_domain::{HealthCheckConfig, UpstreamStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Background liveness probing, one task per upstream.
///
/// The prober is the single writer of each upstream's health cell; the
/// request path only reads it and never filters on it. Probing cadence is
/// the configured interval, independent of request volume — an upstream is
/// probed at most once per interval no matter how busy the dispatcher is.
#[derive(Debug)]
pub struct HealthProber {
    config: HealthCheckConfig,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl HealthProber {
    pub fn new(config: HealthCheckConfig) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Launch one probe loop per upstream. The first tick fires
    /// immediately, which doubles as connection pre-warming on startup.
    pub fn start(&mut self, upstreams: &UpstreamSet) {
        let interval = Duration::from_secs(self.config.interval.max(1));
        let timeout = Duration::from_millis(self.config.timeout);

        info!(
            upstreams = upstreams.len(),
            interval_secs = interval.as_secs(),
            "starting health probers"
        );

        for upstream in upstreams.iter() {
            let upstream = Arc::clone(upstream);
            let domain = self.config.probe_domain.clone();
            let token = self.shutdown.child_token();

            self.tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => {
                            debug!(upstream = %upstream.protocol(), "health prober stopping");
                            break;
                        }
                        _ = ticker.tick() => {
                            probe_once(&upstream, &domain, timeout).await;
                        }
                    }
                }
            }));
        }
    }

    /// Cancel every probe loop and wait for the tasks to exit.
    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "health prober task aborted");
            }
        }
        info!("health probers stopped");
    }
}

async fn probe_once(upstream: &Upstream, domain: &str, timeout: Duration) {
    let previous = upstream.health();
    match upstream.probe(domain, timeout).await {
        Ok(()) => {
            upstream.mark_healthy();
            if previous != UpstreamStatus::Healthy {
                info!(upstream = %upstream.protocol(), "upstream healthy");
            }
        }
        Err(e) => {
            upstream.mark_unhealthy();
            if previous != UpstreamStatus::Unhealthy {
                info!(upstream = %upstream.protocol(), error = %e, "upstream unhealthy");
            } else {
                debug!(upstream = %upstream.protocol(), error = %e, "upstream still unhealthy");
            }
        }
    }
}
