//! Dispatch executor
//!
//! Delivers one message to every subscription of its topic. The set of
//! recipients is the registry snapshot taken when `publish` is called; each
//! recipient gets its own task on the dispatch pool so a slow or failing
//! subscriber never holds up the others.
//!
//! A subscription whose `notify` returns an error (or panics) is considered
//! gone: it is evicted from its topic and ended. The subscriber's other
//! subscriptions are untouched. The failure is logged and counted in the
//! [`DispatchOutcome`], never reported to the publisher.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::broker::message::Message;
use crate::broker::registry::{Registry, SubscriptionRef};
use crate::executor::{Completion, WorkerPool, panic_reason};
use crate::utils::BrokerError;

/// What happened to one published message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Size of the snapshot the message was offered to.
    pub attempted: usize,
    pub delivered: usize,
    /// Filtered out, or already ended when its turn came.
    pub rejected: usize,
    /// Delivery failed and the subscription was ended.
    pub failed: usize,
}

enum Delivery {
    Delivered,
    Rejected,
    Failed,
}

#[derive(Debug)]
pub struct DispatchExecutor {
    pool: WorkerPool,
    registry: Arc<Registry>,
}

impl DispatchExecutor {
    pub fn new(registry: Arc<Registry>, parallelism: usize) -> Result<Self, BrokerError> {
        Ok(Self {
            pool: WorkerPool::new("dispatch", parallelism)?,
            registry,
        })
    }

    pub fn publish(&self, message: Message) -> Result<Completion<DispatchOutcome>, BrokerError> {
        let snapshot = self.registry.snapshot(message.topic());
        let registry = self.registry.clone();

        self.pool.submit(async move {
            match snapshot {
                Some(recipients) => fan_out(registry, Arc::new(message), recipients).await,
                None => {
                    debug!(topic = %message.topic(), id = message.id(), "no subscribers, message dropped");
                    DispatchOutcome::default()
                }
            }
        })
    }

    pub(crate) fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}

async fn fan_out(
    registry: Arc<Registry>,
    message: Arc<Message>,
    recipients: Vec<SubscriptionRef>,
) -> DispatchOutcome {
    let mut outcome = DispatchOutcome {
        attempted: recipients.len(),
        ..DispatchOutcome::default()
    };

    // runs on the dispatch pool, so tokio::spawn lands on the same pool
    let deliveries = recipients.into_iter().map(|sub| {
        let registry = registry.clone();
        let message = message.clone();
        tokio::spawn(async move { deliver(&registry, &message, sub) })
    });

    for result in join_all(deliveries).await {
        match result {
            Ok(Delivery::Delivered) => outcome.delivered += 1,
            Ok(Delivery::Rejected) => outcome.rejected += 1,
            Ok(Delivery::Failed) => outcome.failed += 1,
            Err(err) => {
                warn!(id = message.id(), %err, "delivery task aborted");
                outcome.failed += 1;
            }
        }
    }

    debug!(
        topic = %message.topic(),
        id = message.id(),
        attempted = outcome.attempted,
        delivered = outcome.delivered,
        rejected = outcome.rejected,
        failed = outcome.failed,
        "message dispatched"
    );
    outcome
}

fn deliver(registry: &Registry, message: &Message, sub: SubscriptionRef) -> Delivery {
    if sub.is_ended() {
        return Delivery::Rejected;
    }

    let attempt = catch_unwind(AssertUnwindSafe(|| {
        if !sub.accept(message) {
            return Ok(false);
        }
        sub.notify(message).map(|_| true)
    }));

    let reason = match attempt {
        Ok(Ok(true)) => return Delivery::Delivered,
        Ok(Ok(false)) => return Delivery::Rejected,
        Ok(Err(err)) => err.to_string(),
        Err(payload) => format!("panicked: {}", panic_reason(payload)),
    };

    warn!(
        subscriber = sub.id(),
        topic = %sub.topic(),
        id = message.id(),
        %reason,
        "delivery failed, ending subscription"
    );
    registry.evict(&sub);
    sub.end();
    Delivery::Failed
}
