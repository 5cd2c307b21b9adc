//! # PopSub core
//!
//! `popsub_core` is the concurrent heart of a topic-based publish/subscribe
//! broker. Publishers post messages tagged with a topic; subscribers register
//! interest in topics, optionally with a content filter; the broker fans every
//! message out to the matching subscribers that are registered at that moment.
//!
//! Transports (WebSocket servers, component frameworks, in-process adapters)
//! sit on top: they call the [`Broker`](broker::Broker) and implement
//! [`Subscriber`](broker::Subscriber) to carry messages to the remote side.
//! The broker wraps each subscribe call in its own
//! [`Subscription`](broker::Subscription), which holds that registration's
//! filter and lifecycle.
//!
//! ## Core Modules
//!
//! - `broker`: topics, messages, filters, the subscription registry and the
//!   `Broker` facade.
//! - `executor`: the dispatch and mutation worker pools behind the broker.
//! - `client`: a channel-backed `Subscriber` for transports.
//! - `config`: loading settings from files and environment variables.
//! - `utils`: error types and logging initialisation.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use popsub_core::broker::{Broker, Message, Topic};
//! use popsub_core::client::Client;
//!
//! # async fn run() -> Result<(), popsub_core::utils::BrokerError> {
//! let broker = Broker::new()?;
//! let news = Topic::new("news")?;
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! broker.subscribe(Arc::new(Client::new(tx)), &news)?.await?;
//!
//! broker
//!     .publish(Message::builder(news).content("hello").build())?
//!     .await?;
//! assert_eq!(rx.recv().await.unwrap().content(), "hello");
//!
//! broker.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod client;
pub mod config;
pub mod executor;
pub mod utils;
