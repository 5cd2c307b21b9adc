//! Subscription registry
//!
//! The registry is the only shared mutable state of the broker: a concurrent
//! map from topic to a concurrent map of `subscriber id → subscription`.
//! Both levels are `DashMap`s, so every operation here is an atomic per-key
//! operation and callers never need a broker-wide lock.
//!
//! Concurrency and usage notes:
//! - Queries are weakly consistent: a mutation running concurrently may or may
//!   not be visible, but no query ever sees a half-written entry.
//! - Nothing here calls back into a subscription. Operations that detach
//!   subscriptions return them, and the caller ends them once every map guard
//!   is dropped.
//! - Emptying a topic keeps its (empty) inner map; only `remove_topic` and
//!   `drain` make a topic disappear.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::broker::subscription::Subscription;
use crate::broker::topic::Topic;

pub type SubscriptionRef = Arc<Subscription>;

type Subscribers = DashMap<String, SubscriptionRef>;

#[derive(Default)]
pub struct Registry {
    topics: DashMap<Topic, Arc<Subscribers>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `subscription` under its topic, replacing any entry with the
    /// same subscriber id.
    ///
    /// Returns the replaced subscription, if any.
    pub fn put(&self, subscription: SubscriptionRef) -> Option<SubscriptionRef> {
        let id = subscription.id().to_string();
        let topic = subscription.topic().clone();
        debug!(%topic, subscriber = %id, "registry put");
        // insert under the topic entry guard so a concurrent remove_topic
        // cannot detach the map between lookup and insert
        self.topics
            .entry(topic)
            .or_insert_with(|| Arc::new(DashMap::new()))
            .insert(id, subscription)
    }

    /// Atomically remove and return the subscription `id` registered under `topic`.
    pub fn remove(&self, topic: &Topic, id: &str) -> Option<SubscriptionRef> {
        let subscribers = self.subscribers(topic)?;
        let removed = subscribers.remove(id).map(|(_, sub)| sub);
        if removed.is_some() {
            debug!(%topic, subscriber = %id, "registry remove");
        }
        removed
    }

    pub fn get(&self, topic: &Topic, id: &str) -> Option<SubscriptionRef> {
        let subscribers = self.subscribers(topic)?;
        subscribers.get(id).map(|entry| entry.value().clone())
    }

    /// Remove `subscription` from its topic if it is still the registered entry.
    ///
    /// A newer subscription registered under the same id in the meantime is
    /// left alone.
    pub fn evict(&self, subscription: &SubscriptionRef) -> bool {
        let topic = subscription.topic();
        let id = subscription.id();
        let evicted = self.subscribers(topic).is_some_and(|subs| {
            subs.remove_if(id, |_, current| Arc::ptr_eq(current, subscription))
                .is_some()
        });
        debug!(%topic, subscriber = %id, evicted, "registry evict");
        evicted
    }

    /// Detach the whole subscriber map of `topic`.
    ///
    /// The caller is responsible for ending the detached subscriptions.
    pub fn remove_topic(&self, topic: &Topic) -> Option<Vec<SubscriptionRef>> {
        let (_, subscribers) = self.topics.remove(topic)?;
        debug!(%topic, count = subscribers.len(), "registry remove topic");
        Some(values(&subscribers))
    }

    /// Subscriptions a message published on `topic` must be offered to.
    ///
    /// While a `ROOT` entry exists it captures every publish: the `ROOT`
    /// subscribers are returned whatever `topic` is.
    pub fn snapshot(&self, topic: &Topic) -> Option<Vec<SubscriptionRef>> {
        if let Some(root) = self.subscribers(&Topic::root()) {
            return Some(values(&root));
        }
        self.subscribers(topic).map(|subs| values(&subs))
    }

    /// Detach every topic and return all the subscriptions that were registered.
    pub fn drain(&self) -> Vec<SubscriptionRef> {
        let mut drained = Vec::new();
        for topic in self.topics() {
            if let Some(subs) = self.remove_topic(&topic) {
                drained.extend(subs);
            }
        }
        drained
    }

    pub fn has_topic(&self, topic: &Topic) -> bool {
        self.topics.contains_key(topic)
    }

    /// Is `id` registered under at least one topic?
    pub fn is_subscribed(&self, id: &str) -> bool {
        self.topics.iter().any(|entry| entry.value().contains_key(id))
    }

    pub fn is_subscribed_to(&self, topic: &Topic, id: &str) -> bool {
        self.subscribers(topic)
            .is_some_and(|subs| subs.contains_key(id))
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.topics.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.subscribers(topic).map_or(0, |subs| subs.len())
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    fn subscribers(&self, topic: &Topic) -> Option<Arc<Subscribers>> {
        self.topics.get(topic).map(|entry| entry.value().clone())
    }
}

fn values(subscribers: &Subscribers) -> Vec<SubscriptionRef> {
    subscribers
        .iter()
        .map(|entry| entry.value().clone())
        .collect()
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("topics", &self.topics.len())
            .finish()
    }
}
