//! The `client` module defines the representation of a remote client in the
//! Pub/Sub system.
//!
//! It provides the `Client` struct, a ready-made [`Subscriber`](crate::broker::Subscriber)
//! for transports that hand messages to a per-connection task through a tokio
//! channel.

pub mod pubsub_client;
pub use pubsub_client::Client;

#[cfg(test)]
mod tests;
