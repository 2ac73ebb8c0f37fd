use crate::upstream::{DispatchOutcome, DispatchResult};
use hickory_proto::op::{Message, ResponseCode};
use tracing::debug;

/// Verdict after offering one result to the selector.
#[derive(Debug)]
pub enum Verdict {
    /// Definitive winner; stop waiting for the remaining upstreams.
    Winner(Message),
    /// Keep collecting.
    Pending,
}

/// Success-biased selection policy, evaluated in completion order.
///
/// 1. The first well-formed reply with a success rcode wins immediately.
/// 2. Otherwise, once every upstream has reported, the first-arriving
///    well-formed negative reply wins.
/// 3. If nothing well-formed arrived at all, there is no winner and the
///    dispatch fails in aggregate.
///
/// Pure state over arriving results; no I/O, no clock.
pub struct ResponseSelector {
    first_negative: Option<Message>,
    reported: usize,
}

impl ResponseSelector {
    pub fn new() -> Self {
        Self {
            first_negative: None,
            reported: 0,
        }
    }

    pub fn offer(&mut self, result: DispatchResult) -> Verdict {
        self.reported += 1;
        match result.outcome {
            DispatchOutcome::Reply(reply) => {
                if reply.response_code() == ResponseCode::NoError {
                    debug!(
                        upstream = result.index,
                        rank = result.rank,
                        "success reply selected"
                    );
                    Verdict::Winner(reply)
                } else {
                    if self.first_negative.is_none() {
                        debug!(
                            upstream = result.index,
                            rank = result.rank,
                            rcode = ?reply.response_code(),
                            "first negative reply retained"
                        );
                        self.first_negative = Some(reply);
                    }
                    Verdict::Pending
                }
            }
            DispatchOutcome::TransportError(ref error)
            | DispatchOutcome::ProtocolError(ref error) => {
                debug!(
                    upstream = result.index,
                    rank = result.rank,
                    %error,
                    "result discarded"
                );
                Verdict::Pending
            }
        }
    }

    /// Final decision once every upstream has reported: the first-arriving
    /// negative reply, or nothing.
    pub fn conclude(self) -> Option<Message> {
        self.first_negative
    }

    pub fn reported(&self) -> usize {
        self.reported
    }
}

impl Default for ResponseSelector {
    fn default() -> Self {
        Self::new()
    }
}
