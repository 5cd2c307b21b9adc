//! Message definitions for the broker
//!
//! `Message` is the immutable envelope a publisher hands to the broker. The
//! broker only routes on `topic`; everything else is carried untouched to the
//! subscribers.
//!
//! Notes on fields:
//! - `id`: globally unique, generated by the builder unless given
//! - `timestamp`: milliseconds since UNIX epoch; set when the message is built,
//!   a transport may overwrite it on remote delivery with `set_timestamp`
//! - `owner`: identity of the originating host
//! - `content`: opaque payload, the broker never looks inside
//! - `properties`: typed values that filters can inspect

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::broker::topic::Topic;
use crate::utils::PropertyError;

/// A primitive value stored in the property bag of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PropertyValue {
    String(String),
    Byte(i8),
    Short(i16),
    Char(char),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
}

impl PropertyValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "string",
            PropertyValue::Byte(_) => "byte",
            PropertyValue::Short(_) => "short",
            PropertyValue::Char(_) => "char",
            PropertyValue::Int(_) => "int",
            PropertyValue::Long(_) => "long",
            PropertyValue::Float(_) => "float",
            PropertyValue::Double(_) => "double",
            PropertyValue::Bool(_) => "bool",
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(v) => write!(f, "{v}"),
            PropertyValue::Byte(v) => write!(f, "{v}"),
            PropertyValue::Short(v) => write!(f, "{v}"),
            PropertyValue::Char(v) => write!(f, "{v}"),
            PropertyValue::Int(v) => write!(f, "{v}"),
            PropertyValue::Long(v) => write!(f, "{v}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::Double(v) => write!(f, "{v}"),
            PropertyValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! property_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for PropertyValue {
                fn from(value: $ty) -> Self {
                    PropertyValue::$variant(value.into())
                }
            }
        )*
    };
}

property_from! {
    String => String,
    &str => String,
    i8 => Byte,
    i16 => Short,
    char => Char,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    bool => Bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: String,
    timestamp: i64,
    owner: String,
    topic: Topic,
    content: String,
    #[serde(default)]
    properties: HashMap<String, PropertyValue>,
}

/// Generates a typed accessor over the property bag.
macro_rules! typed_getter {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $ty:ty, $expected:literal) => {
        $(#[$doc])*
        pub fn $name(&self, key: &str) -> Result<$ty, PropertyError> {
            match self.property(key)? {
                PropertyValue::$variant(v) => Ok(v.clone()),
                other => Err(PropertyError::TypeMismatch {
                    key: key.to_string(),
                    expected: $expected,
                    found: other.type_name(),
                }),
            }
        }
    };
}

impl Message {
    /// Start building a message published on `topic`.
    pub fn builder(topic: Topic) -> MessageBuilder {
        MessageBuilder::new(topic)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Overwrite the timestamp, e.g. with the time of remote delivery.
    pub fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = timestamp;
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn properties(&self) -> &HashMap<String, PropertyValue> {
        &self.properties
    }

    /// Raw access to a property, whatever its type.
    pub fn property(&self, key: &str) -> Result<&PropertyValue, PropertyError> {
        self.properties.get(key).ok_or_else(|| PropertyError::Missing {
            key: key.to_string(),
        })
    }

    typed_getter!(get_string, String, String, "string");
    typed_getter!(get_byte, Byte, i8, "byte");
    typed_getter!(get_short, Short, i16, "short");
    typed_getter!(get_char, Char, char, "char");
    typed_getter!(
        /// Fails with a type mismatch for `byte`, `short` or `long` values:
        /// no implicit widening or narrowing happens.
        get_int, Int, i32, "int"
    );
    typed_getter!(get_long, Long, i64, "long");
    typed_getter!(get_float, Float, f32, "float");
    typed_getter!(get_double, Double, f64, "double");
    typed_getter!(get_bool, Bool, bool, "bool");
}

pub struct MessageBuilder {
    topic: Topic,
    id: Option<String>,
    timestamp: Option<i64>,
    owner: Option<String>,
    content: String,
    properties: HashMap<String, PropertyValue>,
}

impl MessageBuilder {
    fn new(topic: Topic) -> Self {
        Self {
            topic,
            id: None,
            timestamp: None,
            owner: None,
            content: String::new(),
            properties: HashMap::new(),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Add a property. A second value for the same key replaces the first.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Message {
        Message {
            id: self
                .id
                .unwrap_or_else(|| format!("Message-{}", Uuid::new_v4())),
            timestamp: self
                .timestamp
                .unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
            owner: self.owner.unwrap_or_else(local_host),
            topic: self.topic,
            content: self.content,
            properties: self.properties,
        }
    }
}

fn local_host() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
