pub mod engine;
pub mod filter;
pub mod message;
pub mod registry;
pub mod subscription;
pub mod topic;

pub use engine::Broker;
pub use filter::{Filter, Operator};
pub use message::{Message, MessageBuilder, PropertyValue};
pub use registry::{Registry, SubscriptionRef};
pub use subscription::{Subscriber, SubscriberRef, Subscription};
pub use topic::Topic;
