use super::settings::{BrokerSettings, Settings};
use super::load_config;
use crate::utils::BrokerError;

use serial_test::serial;
use std::env;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.broker.dispatch_parallelism, 10);
    assert_eq!(settings.broker.mutation_parallelism, 10);
    assert_eq!(settings.broker.shutdown_grace(), Duration::from_secs(5));
    assert_eq!(settings.logging.level, "info");
}

#[test]
fn test_validate_rejects_empty_pools() {
    let settings = BrokerSettings {
        dispatch_parallelism: 0,
        ..BrokerSettings::default()
    };
    assert!(matches!(settings.validate(), Err(BrokerError::Validation(_))));

    let settings = BrokerSettings {
        mutation_parallelism: 0,
        ..BrokerSettings::default()
    };
    assert!(matches!(settings.validate(), Err(BrokerError::Validation(_))));

    assert!(BrokerSettings::default().validate().is_ok());
}

/// Runs `f` with a fresh temporary directory as the working directory.
fn in_temp_dir<F: FnOnce()>(f: F) {
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    f();

    env::set_current_dir(orig).expect("restore cwd");
}

#[test]
#[serial]
fn load_config_without_sources_uses_defaults() {
    in_temp_dir(|| {
        let cfg = load_config().expect("load_config failed");
        assert_eq!(cfg, Settings::default());
    });
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    in_temp_dir(|| {
        fs::create_dir_all("config").expect("create config dir");
        let toml = r#"
            [broker]
            dispatch_parallelism = 4
            shutdown_grace_ms = 250

            [logging]
            level = "debug"
        "#;
        fs::write("config/default.toml", toml).expect("write config file");

        let cfg = load_config().expect("load_config failed");
        assert_eq!(cfg.broker.dispatch_parallelism, 4);
        // not in the file, default kept
        assert_eq!(cfg.broker.mutation_parallelism, 10);
        assert_eq!(cfg.broker.shutdown_grace_ms, 250);
        assert_eq!(cfg.logging.level, "debug");
    });
}

#[test]
#[serial]
fn environment_overrides_file() {
    in_temp_dir(|| {
        fs::create_dir_all("config").expect("create config dir");
        fs::write(
            "config/default.toml",
            "[broker]\ndispatch_parallelism = 4\nmutation_parallelism = 4\n",
        )
        .expect("write config file");

        temp_env::with_vars(
            [
                ("POPSUB_BROKER__DISPATCH_PARALLELISM", Some("2")),
                ("POPSUB_LOGGING__LEVEL", Some("warn")),
            ],
            || {
                let cfg = load_config().expect("load_config failed");
                assert_eq!(cfg.broker.dispatch_parallelism, 2);
                assert_eq!(cfg.broker.mutation_parallelism, 4);
                assert_eq!(cfg.logging.level, "warn");
            },
        );
    });
}
