//! Broker engine
//!
//! The `Broker` is the only object a transport talks to. It composes:
//! - the [`Registry`], the single source of truth for who listens to what
//! - a [`DispatchExecutor`] that fans published messages out
//! - a [`MutationExecutor`] that applies subscription changes
//!
//! Concurrency and usage notes:
//! - The broker is shared as a plain `Arc<Broker>`; no outer lock is needed.
//! - Mutating and publishing calls validate their arguments on the caller's
//!   thread, then return a [`Completion`] immediately. The work itself runs on
//!   the executors' pools.
//! - Queries (`has_topic`, `is_subscribed`, `topics`) read the registry
//!   directly and never wait on pool work.
//! - After `shutdown` every mutating or publishing call fails with
//!   [`BrokerError::ShutDown`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::info;

use crate::broker::filter::Filter;
use crate::broker::message::Message;
use crate::broker::registry::{Registry, SubscriptionRef};
use crate::broker::subscription::SubscriberRef;
use crate::broker::topic::Topic;
use crate::config::BrokerSettings;
use crate::executor::{Completion, DispatchExecutor, DispatchOutcome, MutationExecutor};
use crate::utils::BrokerError;

#[derive(Debug)]
pub struct Broker {
    registry: Arc<Registry>,
    dispatcher: DispatchExecutor,
    mutator: MutationExecutor,
    shutdown_grace: Duration,
    shut_down: AtomicBool,
}

impl Broker {
    /// Create a broker with default settings: 10 dispatch workers, 10 mutation
    /// workers and a 5 second shutdown grace period.
    pub fn new() -> Result<Self, BrokerError> {
        Self::with_settings(&BrokerSettings::default())
    }

    pub fn with_settings(settings: &BrokerSettings) -> Result<Self, BrokerError> {
        settings.validate()?;

        let registry = Arc::new(Registry::new());
        let dispatcher = DispatchExecutor::new(registry.clone(), settings.dispatch_parallelism)?;
        let mutator = MutationExecutor::new(registry.clone(), settings.mutation_parallelism)?;

        info!(
            dispatch_parallelism = settings.dispatch_parallelism,
            mutation_parallelism = settings.mutation_parallelism,
            "broker started"
        );

        Ok(Self {
            registry,
            dispatcher,
            mutator,
            shutdown_grace: settings.shutdown_grace(),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Publish a message to the current subscribers of its topic.
    pub fn publish(&self, message: Message) -> Result<Completion<DispatchOutcome>, BrokerError> {
        self.ensure_running()?;
        self.dispatcher.publish(message)
    }

    /// Subscribe `sub` to `topic`, accepting every message.
    ///
    /// Every call creates a fresh subscription. One already registered for the
    /// same id and topic is replaced and ended, together with its filter.
    /// Resolves to the new subscription.
    pub fn subscribe(
        &self,
        sub: SubscriberRef,
        topic: &Topic,
    ) -> Result<Completion<SubscriptionRef>, BrokerError> {
        self.ensure_running()?;
        ensure_id(sub.id())?;
        self.mutator.subscribe(topic.clone(), sub, None)
    }

    /// Subscribe `sub` to `topic`; only messages accepted by `filter` are delivered.
    pub fn subscribe_with_filter(
        &self,
        sub: SubscriberRef,
        topic: &Topic,
        filter: Filter,
    ) -> Result<Completion<SubscriptionRef>, BrokerError> {
        self.ensure_running()?;
        ensure_id(sub.id())?;
        self.mutator.subscribe(topic.clone(), sub, Some(filter))
    }

    /// Unsubscribe `id` from `topic` and end that subscription.
    ///
    /// Resolves to `false` if `id` was not subscribed to `topic`.
    pub fn unsubscribe(&self, id: &str, topic: &Topic) -> Result<Completion<bool>, BrokerError> {
        self.ensure_running()?;
        ensure_id(id)?;
        self.mutator.unsubscribe(topic.clone(), id.to_string())
    }

    /// Unsubscribe `id` from every topic.
    ///
    /// Resolves to the number of topics it was removed from.
    pub fn unsubscribe_all(&self, id: &str) -> Result<Completion<usize>, BrokerError> {
        self.ensure_running()?;
        ensure_id(id)?;
        self.mutator.unsubscribe_all(id.to_string())
    }

    /// Set or replace the filter of `id` on `topic`. Its subscriptions to
    /// other topics keep their own filters.
    pub fn filter(
        &self,
        id: &str,
        topic: &Topic,
        filter: Filter,
    ) -> Result<Completion<bool>, BrokerError> {
        self.ensure_running()?;
        ensure_id(id)?;
        self.mutator.update_filter(topic.clone(), id.to_string(), filter)
    }

    /// Delete `topic` and end all of its subscriptions.
    ///
    /// Messages already being dispatched to the topic may still reach them.
    pub fn remove_topic(&self, topic: &Topic) -> Result<Completion<usize>, BrokerError> {
        self.ensure_running()?;
        self.mutator.remove_topic(topic.clone())
    }

    pub fn has_topic(&self, topic: &Topic) -> bool {
        self.registry.has_topic(topic)
    }

    /// Is `id` subscribed to at least one topic?
    pub fn is_subscribed(&self, id: &str) -> bool {
        self.registry.is_subscribed(id)
    }

    pub fn is_subscribed_to(&self, id: &str, topic: &Topic) -> bool {
        self.registry.is_subscribed_to(topic, id)
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.registry.topics()
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.registry.subscriber_count(topic)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// End every subscription, empty the registry and stop both pools.
    ///
    /// Each pool gets the configured grace period to finish in-flight work
    /// before the rest is cancelled. Calling `shutdown` again does nothing.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let ended = self.mutator.end_all();
        info!(ended, "broker shutting down");

        tokio::join!(
            self.dispatcher.pool().shutdown(self.shutdown_grace),
            self.mutator.pool().shutdown(self.shutdown_grace),
        );

        // subscribe units still running during the grace period may have
        // registered again
        let late = self.mutator.end_all();
        info!(late, "broker stopped");
    }

    fn ensure_running(&self) -> Result<(), BrokerError> {
        if self.is_shut_down() {
            Err(BrokerError::ShutDown)
        } else {
            Ok(())
        }
    }
}

fn ensure_id(id: &str) -> Result<(), BrokerError> {
    if id.is_empty() {
        Err(BrokerError::validation("subscriber id cannot be empty"))
    } else {
        Ok(())
    }
}
