use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a `HashMap`
/// lookup instead of `set_var`/`remove_var`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("PARKBASE_ENV", "development"))?;
    let bind_addr = parse_addr("PARKBASE_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("PARKBASE_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("PARKBASE_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("PARKBASE_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("PARKBASE_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let rate_limit_max = parse_usize("PARKBASE_RATE_LIMIT_MAX", "100")?;
    if rate_limit_max == 0 {
        return Err(invalid(
            "PARKBASE_RATE_LIMIT_MAX",
            "must be at least 1".to_string(),
        ));
    }
    let rate_limit_window_secs = parse_u64("PARKBASE_RATE_LIMIT_WINDOW_SECS", "3600")?;
    if rate_limit_window_secs == 0 {
        return Err(invalid(
            "PARKBASE_RATE_LIMIT_WINDOW_SECS",
            "must be at least 1".to_string(),
        ));
    }

    let body_limit_bytes = parse_usize("PARKBASE_BODY_LIMIT_BYTES", "10240")?;
    let client_build_dir = PathBuf::from(or_default("PARKBASE_CLIENT_BUILD_DIR", "./client/build"));
    let webhook_secret = lookup("STRIPE_WEBHOOK_SECRET")
        .ok()
        .filter(|s| !s.trim().is_empty());
    if webhook_secret.is_none() && env != Environment::Development {
        return Err(ConfigError::MissingEnvVar(
            "STRIPE_WEBHOOK_SECRET".to_string(),
        ));
    }

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        rate_limit_max,
        rate_limit_window_secs,
        body_limit_bytes,
        client_build_dir,
        webhook_secret,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "PARKBASE_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
