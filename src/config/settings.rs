use std::time::Duration;

use serde::Deserialize;

use crate::executor::{DEFAULT_PARALLELISM, DEFAULT_SHUTDOWN_GRACE};
use crate::utils::BrokerError;

/// Top-level configuration settings for the broker core.
///
/// Includes settings for the broker's worker pools and for logging.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub logging: LoggingSettings,
}

/// Configuration settings for the broker.
///
/// Sizes the dispatch and mutation pools and bounds how long shutdown waits
/// for in-flight work.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    pub dispatch_parallelism: usize,
    pub mutation_parallelism: usize,
    pub shutdown_grace_ms: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
}

impl BrokerSettings {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Rejects pool sizes of zero.
    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.dispatch_parallelism == 0 {
            return Err(BrokerError::validation(
                "dispatch_parallelism must be at least 1",
            ));
        }
        if self.mutation_parallelism == 0 {
            return Err(BrokerError::validation(
                "mutation_parallelism must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

/// Partial broker settings.
#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub dispatch_parallelism: Option<usize>,
    pub mutation_parallelism: Option<usize>,
    pub shutdown_grace_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            dispatch_parallelism: DEFAULT_PARALLELISM,
            mutation_parallelism: DEFAULT_PARALLELISM,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE.as_millis() as u64,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Provides default values for `Settings`.
///
/// Ensures the broker has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: BrokerSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}
