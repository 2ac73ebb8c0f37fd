use crate::upstream::{DispatchOutcome, DispatchResult, UpstreamSet};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use hickory_proto::op::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Bounded fan-out of one query across the upstream set.
///
/// At most `worker_count` sends are in flight at a time. Upstreams are
/// claimed in set order and a freed slot is refilled immediately while
/// unclaimed upstreams remain, so every upstream is attempted within a
/// single dispatch even at `worker_count = 1` — unless the consumer stops
/// polling because a winner was already selected.
#[derive(Debug)]
pub struct WorkerPool {
    worker_count: usize,
}

impl WorkerPool {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count: worker_count.max(1),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Start the sends for one dispatch. Results stream back through the
    /// returned run in completion order, never submission order.
    pub fn dispatch(
        &self,
        upstreams: &UpstreamSet,
        request: &Message,
        deadline: Duration,
    ) -> DispatchRun {
        let mut run = DispatchRun {
            upstreams: upstreams.clone(),
            request: Arc::new(request.clone()),
            deadline,
            in_flight: FuturesUnordered::new(),
            next_index: 0,
            completed: 0,
        };

        let seed = self.worker_count.min(upstreams.len());
        debug!(
            upstreams = upstreams.len(),
            workers = seed,
            "starting dispatch"
        );
        for _ in 0..seed {
            run.claim_next();
        }
        run
    }
}

/// One in-flight dispatch.
///
/// Dropping the run leaves already-started sends running detached; their
/// results are discarded. That is the accepted best-effort cancellation:
/// the underlying transports have no mid-flight abort.
pub struct DispatchRun {
    upstreams: UpstreamSet,
    request: Arc<Message>,
    deadline: Duration,
    in_flight: FuturesUnordered<JoinHandle<(usize, DispatchOutcome)>>,
    next_index: usize,
    completed: usize,
}

impl DispatchRun {
    /// Total upstreams this dispatch will attempt.
    pub fn total(&self) -> usize {
        self.upstreams.len()
    }

    fn claim_next(&mut self) {
        let Some(upstream) = self.upstreams.get(self.next_index) else {
            return;
        };
        let index = self.next_index;
        self.next_index += 1;

        let upstream = Arc::clone(upstream);
        let request = Arc::clone(&self.request);
        let deadline = self.deadline;
        self.in_flight.push(tokio::spawn(async move {
            (index, upstream.send(&request, deadline).await)
        }));
    }

    /// Next result in completion order; `None` once every upstream has
    /// reported.
    pub async fn next_result(&mut self) -> Option<DispatchResult> {
        while let Some(joined) = self.in_flight.next().await {
            // refill the freed slot before reporting, keeping concurrency
            // at min(worker_count, remaining)
            self.claim_next();

            match joined {
                Ok((index, outcome)) => {
                    let rank = self.completed;
                    self.completed += 1;
                    return Some(DispatchResult {
                        index,
                        outcome,
                        rank,
                    });
                }
                Err(e) => {
                    // a panicked send task reports nothing; its upstream
                    // simply never contributes a candidate
                    warn!(error = %e, "upstream send task failed to complete");
                }
            }
        }
        None
    }
}
