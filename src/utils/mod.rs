//! The `utils` module provides the pieces shared by every other module of
//! `popsub_core`: the error taxonomy and logging initialisation.

pub mod error;
pub mod logging;

pub use error::{BrokerError, DeliveryError, PropertyError};
