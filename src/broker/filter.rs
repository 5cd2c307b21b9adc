//! Content filters
//!
//! A [`Filter`] is a predicate over a [`Message`] that gates delivery to one
//! subscription. Any closure can be used through [`from_fn`]; [`by_int`] and
//! [`by_string`] cover the common case of comparing a message property.
//!
//! Property filters never panic: a message that lacks the property, or holds
//! it with another type, is rejected.

use std::fmt;
use std::sync::Arc;

use crate::broker::message::{Message, PropertyValue};

pub type Filter = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

pub fn from_fn<F>(predicate: F) -> Filter
where
    F: Fn(&Message) -> bool + Send + Sync + 'static,
{
    Arc::new(predicate)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Less,
    Greater,
    Equal,
    LessOrEqual,
    GreaterOrEqual,
    NotEqual,
}

impl Operator {
    pub fn apply(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Operator::Less => lhs < rhs,
            Operator::Greater => lhs > rhs,
            Operator::Equal => lhs == rhs,
            Operator::LessOrEqual => lhs <= rhs,
            Operator::GreaterOrEqual => lhs >= rhs,
            Operator::NotEqual => lhs != rhs,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Operator::Less => "<",
            Operator::Greater => ">",
            Operator::Equal => "==",
            Operator::LessOrEqual => "<=",
            Operator::GreaterOrEqual => ">=",
            Operator::NotEqual => "!=",
        };
        f.write_str(text)
    }
}

/// Accept messages whose integral property `key` satisfies `property op value`.
///
/// `byte`, `short`, `int` and `long` properties are all compared as `i64`.
pub fn by_int(op: Operator, key: impl Into<String>, value: i64) -> Filter {
    let key = key.into();
    from_fn(move |message| {
        let actual = match message.property(&key) {
            Ok(PropertyValue::Byte(v)) => i64::from(*v),
            Ok(PropertyValue::Short(v)) => i64::from(*v),
            Ok(PropertyValue::Int(v)) => i64::from(*v),
            Ok(PropertyValue::Long(v)) => *v,
            _ => return false,
        };
        op.apply(actual, value)
    })
}

/// Accept messages whose string property `key` equals `value`.
pub fn by_string(key: impl Into<String>, value: impl Into<String>) -> Filter {
    let key = key.into();
    let value = value.into();
    from_fn(move |message| matches!(message.get_string(&key), Ok(v) if v == value))
}
