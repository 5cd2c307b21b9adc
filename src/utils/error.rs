//! The `error` module defines the error types used across `popsub_core`.
//!
//! Errors fall into three groups:
//!
//! - [`BrokerError`]: returned synchronously by broker operations (validation,
//!   use after shutdown) or through a [`Completion`](crate::executor::Completion)
//!   when a unit of work could not run to the end.
//! - [`DeliveryError`]: returned by [`Subscriber::notify`](crate::broker::Subscriber::notify).
//!   The dispatcher never propagates it; it ends the subscription the delivery
//!   went through instead.
//! - [`PropertyError`]: returned by the typed property accessors of
//!   [`Message`](crate::broker::Message).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("invalid argument: {0}")]
    Validation(String),

    #[error("broker has been shut down")]
    ShutDown,

    #[error("work was cancelled before it completed")]
    Cancelled,

    #[error("worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("failed to start the {pool} worker pool")]
    PoolStart {
        pool: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl BrokerError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// A failed attempt to hand a message to a remote subscriber.
#[derive(Debug, Error)]
#[error("delivery to {subscriber} failed: {reason}")]
pub struct DeliveryError {
    pub subscriber: String,
    pub reason: String,
}

impl DeliveryError {
    pub fn new(subscriber: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            subscriber: subscriber.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PropertyError {
    #[error("property '{key}' is not set")]
    Missing { key: String },

    #[error("property '{key}' holds {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}
