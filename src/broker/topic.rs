//! Topic management
//!
//! A `Topic` is the routing key of a message. Topics are plain validated
//! names: equality and hashing go through the name only, so two `Topic`
//! values built from the same string address the same subscribers.
//!
//! One name is reserved: `ROOT`. It cannot be built through [`Topic::new`];
//! [`Topic::root`] hands it out to hierarchical deployments, where a
//! forwarding node subscribes under `ROOT` to receive every message.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::BrokerError;

const ROOT_NAME: &str = "ROOT";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic {
    name: String,
}

impl Topic {
    /// Create a topic with the given name.
    ///
    /// Fails when the name is empty or is the reserved `ROOT` name.
    pub fn new(name: impl Into<String>) -> Result<Self, BrokerError> {
        let name = name.into();
        if name.is_empty() {
            return Err(BrokerError::validation("topic name cannot be empty"));
        }
        if name == ROOT_NAME {
            return Err(BrokerError::validation(
                "topic name ROOT is reserved for hierarchical routing",
            ));
        }
        Ok(Self { name })
    }

    /// The reserved topic a forwarding node subscribes to.
    pub fn root() -> Self {
        Self {
            name: ROOT_NAME.to_string(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.name == ROOT_NAME
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl TryFrom<String> for Topic {
    type Error = BrokerError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        if name == ROOT_NAME {
            Ok(Self::root())
        } else {
            Self::new(name)
        }
    }
}

impl TryFrom<&str> for Topic {
    type Error = BrokerError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        Self::try_from(name.to_string())
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.name
    }
}
