mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{BrokerSettings, LoggingSettings, Settings};

/// Prefix of the environment variables read by [`load_config`].
pub const ENV_PREFIX: &str = "POPSUB";

/// Loads the configuration from `.env`, the default file and environment variables
/// Merges the configuration with default values
/// Returns a `Settings` struct containing the broker and logging configurations
///
/// Environment variables are prefixed with `POPSUB_` and nested with `__`,
/// e.g. `POPSUB_BROKER__DISPATCH_PARALLELISM=4`.
pub fn load_config() -> Result<Settings, ConfigError> {
    // a missing .env file is the common case
    let _ = dotenvy::dotenv();

    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    let default = Settings::default();

    Ok(Settings {
        broker: BrokerSettings {
            dispatch_parallelism: partial
                .broker
                .as_ref()
                .and_then(|b| b.dispatch_parallelism)
                .unwrap_or(default.broker.dispatch_parallelism),
            mutation_parallelism: partial
                .broker
                .as_ref()
                .and_then(|b| b.mutation_parallelism)
                .unwrap_or(default.broker.mutation_parallelism),
            shutdown_grace_ms: partial
                .broker
                .as_ref()
                .and_then(|b| b.shutdown_grace_ms)
                .unwrap_or(default.broker.shutdown_grace_ms),
        },
        logging: LoggingSettings {
            level: partial
                .logging
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.logging.level),
        },
    })
}

#[cfg(test)]
mod tests;
