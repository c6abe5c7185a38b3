use platform_registry::{
    AppConfig,
    config::{ConfigError, Env},
};
use serial_test::serial;
use std::{env, panic};

const VARS: &[&str] = &[
    "APP_ENV",
    "DATABASE_URL",
    "JWT_SIGNING_SECRET",
    "JWT_ISSUER",
    "SESSION_TTL_HOURS",
    "LISTEN_ADDR",
    "DB_MAX_CONNECTIONS",
];

// --- Setup/Teardown Utilities ---

/// Run `test` with exactly the given variables set (all others from `VARS`
/// cleared), restoring the previous environment afterwards.
fn with_env<R>(vars: &[(&str, &str)], test: impl FnOnce() -> R + panic::UnwindSafe) -> R {
    let originals: Vec<(&str, Option<String>)> =
        VARS.iter().map(|&var| (var, env::var(var).ok())).collect();

    unsafe {
        for var in VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    let result = panic::catch_unwind(test);

    unsafe {
        for (key, original) in originals {
            match original {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

#[test]
#[serial]
fn test_local_defaults() {
    let config = with_env(&[("DATABASE_URL", "postgres://u:p@host/db")], AppConfig::load).unwrap();

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.jwt_issuer, "platform-registry");
    assert_eq!(config.session_ttl_hours, 24);
    assert_eq!(config.listen_addr, "0.0.0.0:8080");
    assert_eq!(config.db_max_connections, 5);
    assert!(config.uses_local_secret());
}

#[test]
#[serial]
fn test_local_secret_is_reported_only_as_fallback() {
    let config = with_env(
        &[
            ("DATABASE_URL", "postgres://u:p@host/db"),
            ("JWT_SIGNING_SECRET", "my-own-secret"),
        ],
        AppConfig::load,
    )
    .unwrap();

    assert_eq!(config.env, Env::Local);
    assert!(!config.uses_local_secret());
    assert!(AppConfig::default().uses_local_secret());
}

#[test]
#[serial]
fn test_production_requires_signing_secret() {
    let result = with_env(
        &[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "postgres://u:p@host/db"),
        ],
        AppConfig::load,
    );

    assert_eq!(result.unwrap_err(), ConfigError::Missing("JWT_SIGNING_SECRET"));
}

#[test]
#[serial]
fn test_production_with_all_settings() {
    let config = with_env(
        &[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "postgres://u:p@host/db"),
            ("JWT_SIGNING_SECRET", "prod-secret"),
            ("JWT_ISSUER", "registry.example.com"),
            ("SESSION_TTL_HOURS", "8"),
            ("LISTEN_ADDR", "127.0.0.1:9000"),
            ("DB_MAX_CONNECTIONS", "20"),
        ],
        AppConfig::load,
    )
    .unwrap();

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.jwt_secret, "prod-secret");
    assert!(!config.uses_local_secret());
    assert_eq!(config.jwt_issuer, "registry.example.com");
    assert_eq!(config.session_ttl_hours, 8);
    assert_eq!(config.listen_addr, "127.0.0.1:9000");
    assert_eq!(config.db_max_connections, 20);
}

#[test]
#[serial]
fn test_database_url_is_required() {
    let result = with_env(&[], AppConfig::load);
    assert_eq!(result.unwrap_err(), ConfigError::Missing("DATABASE_URL"));
}

#[test]
#[serial]
fn test_invalid_numbers_are_rejected() {
    let bad_ttl = with_env(
        &[("DATABASE_URL", "postgres://db"), ("SESSION_TTL_HOURS", "forever")],
        AppConfig::load,
    );
    assert!(matches!(
        bad_ttl,
        Err(ConfigError::Invalid { name: "SESSION_TTL_HOURS", .. })
    ));

    let zero_ttl = with_env(
        &[("DATABASE_URL", "postgres://db"), ("SESSION_TTL_HOURS", "0")],
        AppConfig::load,
    );
    assert!(matches!(
        zero_ttl,
        Err(ConfigError::Invalid { name: "SESSION_TTL_HOURS", .. })
    ));
}

#[test]
fn test_debug_output_redacts_secret() {
    let config = AppConfig {
        jwt_secret: "do-not-print".to_string(),
        ..AppConfig::default()
    };
    assert!(!format!("{config:?}").contains("do-not-print"));
}
