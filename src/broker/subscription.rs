//! Subscribers and subscriptions
//!
//! Two types meet here:
//!
//! - [`Subscriber`] is implemented by the transport. It names one remote
//!   party (`id`), carries messages to it (`notify`) and drops whatever
//!   channel it opened for a topic once that registration ends (`release`).
//! - [`Subscription`] is created by the broker on every subscribe call. It
//!   binds one subscriber to one topic and owns that registration's filter and
//!   `Active → Ended` state.
//!
//! One subscriber registered on three topics has three independent
//! subscriptions: unsubscribing, refiltering or auto-ending one of them never
//! touches the others. A subscription never comes back once ended; subscribing
//! again creates a new one.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::broker::filter::Filter;
use crate::broker::message::Message;
use crate::broker::topic::Topic;
use crate::utils::DeliveryError;

pub trait Subscriber: Send + Sync {
    /// Stable for the subscriber's lifetime, used as the registry key.
    fn id(&self) -> &str;

    /// Hand `message` to the remote side. An `Err` means the remote side is
    /// gone: the subscription it was delivered through is ended.
    fn notify(&self, message: &Message) -> Result<(), DeliveryError>;

    /// Called once for every subscription of this subscriber that ends.
    fn release(&self, _topic: &Topic) {}
}

pub type SubscriberRef = Arc<dyn Subscriber>;

/// One subscriber's registration on one topic.
pub struct Subscription {
    topic: Topic,
    subscriber: SubscriberRef,
    filter: RwLock<Option<Filter>>,
    ended: AtomicBool,
}

impl Subscription {
    pub fn new(topic: Topic, subscriber: SubscriberRef, filter: Option<Filter>) -> Self {
        Self {
            topic,
            subscriber,
            filter: RwLock::new(filter),
            ended: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        self.subscriber.id()
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn subscriber(&self) -> &SubscriberRef {
        &self.subscriber
    }

    /// Replace the filter. `None` accepts every message.
    pub fn set_filter(&self, filter: Option<Filter>) {
        let mut slot = self.filter.write().unwrap_or_else(|e| e.into_inner());
        *slot = filter;
    }

    pub fn has_filter(&self) -> bool {
        self.filter
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn accept(&self, message: &Message) -> bool {
        // clone out so a slow predicate never holds the lock
        let filter = self
            .filter
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        filter.is_none_or(|f| f(message))
    }

    pub fn notify(&self, message: &Message) -> Result<(), DeliveryError> {
        self.subscriber.notify(message)
    }

    /// Move to `Ended` and release the subscriber's channel for this topic.
    ///
    /// Unsubscribe, topic removal, shutdown and auto-end may race here; only
    /// the first call reaches `release`.
    pub fn end(&self) {
        if !self.ended.swap(true, Ordering::AcqRel) {
            self.subscriber.release(&self.topic);
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id())
            .field("topic", &self.topic)
            .field("filtered", &self.has_filter())
            .field("ended", &self.is_ended())
            .finish()
    }
}
