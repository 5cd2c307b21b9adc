//! Mutation executor
//!
//! Applies subscribe, unsubscribe, filter updates and topic removal to the
//! registry off the caller's thread. Each request is one unit of work on the
//! mutation pool and resolves once the registry reflects it.
//!
//! Units are not ordered with respect to each other, not even for the same
//! `(topic, id)` pair; correctness rests on the registry's atomic per-key
//! operations. A subscription removed by a unit is ended inside that same
//! unit, after the registry has let go of it.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use crate::broker::filter::Filter;
use crate::broker::registry::{Registry, SubscriptionRef};
use crate::broker::subscription::{SubscriberRef, Subscription};
use crate::broker::topic::Topic;
use crate::executor::{Completion, WorkerPool};
use crate::utils::BrokerError;

#[derive(Debug)]
pub struct MutationExecutor {
    pool: WorkerPool,
    registry: Arc<Registry>,
}

impl MutationExecutor {
    pub fn new(registry: Arc<Registry>, parallelism: usize) -> Result<Self, BrokerError> {
        Ok(Self {
            pool: WorkerPool::new("mutation", parallelism)?,
            registry,
        })
    }

    /// Register a fresh subscription of `subscriber` to `topic` with `filter`
    /// (`None` accepts everything).
    ///
    /// The subscription previously registered under the same id and topic, if
    /// any, is replaced and ended. Resolves to the new subscription.
    pub fn subscribe(
        &self,
        topic: Topic,
        subscriber: SubscriberRef,
        filter: Option<Filter>,
    ) -> Result<Completion<SubscriptionRef>, BrokerError> {
        let registry = self.registry.clone();
        self.pool.submit(async move {
            let subscription = Arc::new(Subscription::new(topic, subscriber, filter));
            if let Some(previous) = registry.put(subscription.clone()) {
                debug!(topic = %previous.topic(), subscriber = previous.id(), "replaced subscription ended");
                previous.end();
            }
            subscription
        })
    }

    /// Resolves to `true` if `id` was subscribed to `topic`.
    pub fn unsubscribe(&self, topic: Topic, id: String) -> Result<Completion<bool>, BrokerError> {
        let registry = self.registry.clone();
        self.pool.submit(async move {
            match registry.remove(&topic, &id) {
                Some(sub) => {
                    sub.end();
                    true
                }
                None => false,
            }
        })
    }

    /// Remove `id` from every topic, one parallel removal per topic.
    ///
    /// Resolves to the number of topics `id` was removed from.
    pub fn unsubscribe_all(&self, id: String) -> Result<Completion<usize>, BrokerError> {
        let registry = self.registry.clone();
        self.pool.submit(async move {
            let removals = registry.topics().into_iter().map(|topic| {
                let registry = registry.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    registry
                        .remove(&topic, &id)
                        .map(|sub| sub.end())
                        .is_some()
                })
            });

            let removed = join_all(removals)
                .await
                .into_iter()
                .filter(|res| matches!(res, Ok(true)))
                .count();
            debug!(subscriber = %id, topics = removed, "unsubscribed everywhere");
            removed
        })
    }

    /// Replace the filter of `id` on `topic`. Resolves to `false` if `id` is not
    /// subscribed to `topic`.
    pub fn update_filter(
        &self,
        topic: Topic,
        id: String,
        filter: Filter,
    ) -> Result<Completion<bool>, BrokerError> {
        let registry = self.registry.clone();
        self.pool.submit(async move {
            match registry.get(&topic, &id) {
                Some(sub) => {
                    sub.set_filter(Some(filter));
                    true
                }
                None => false,
            }
        })
    }

    /// Detach `topic` and end all of its subscriptions.
    ///
    /// Resolves to the number of subscriptions ended.
    pub fn remove_topic(&self, topic: Topic) -> Result<Completion<usize>, BrokerError> {
        let registry = self.registry.clone();
        self.pool.submit(async move {
            let detached = registry.remove_topic(&topic).unwrap_or_default();
            for sub in &detached {
                sub.end();
            }
            info!(%topic, ended = detached.len(), "topic removed");
            detached.len()
        })
    }

    /// End every registered subscription and empty the registry, on the
    /// caller's thread.
    pub(crate) fn end_all(&self) -> usize {
        let drained = self.registry.drain();
        for sub in &drained {
            sub.end();
        }
        drained.len()
    }

    pub(crate) fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}
