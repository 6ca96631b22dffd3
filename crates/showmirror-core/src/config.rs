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
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

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

    let parse_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        or_default(var, default)
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("SHOWMIRROR_ENV", "development"))?;
    let bind_addr = parse_addr("SHOWMIRROR_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("SHOWMIRROR_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("SHOWMIRROR_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("SHOWMIRROR_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("SHOWMIRROR_DB_ACQUIRE_TIMEOUT_SECS", "10")?;
    if db_min_connections > db_max_connections {
        return Err(invalid(
            "SHOWMIRROR_DB_MIN_CONNECTIONS",
            format!(
                "min connections ({db_min_connections}) exceeds max connections ({db_max_connections})"
            ),
        ));
    }

    let catalog_base_url = or_default("SHOWMIRROR_CATALOG_BASE_URL", "https://api.tvmaze.com")
        .trim_end_matches('/')
        .to_string();
    let catalog_user_agent = or_default(
        "SHOWMIRROR_CATALOG_USER_AGENT",
        "showmirror/0.1 (catalog-mirror)",
    );
    let catalog_request_timeout_secs = parse_u64("SHOWMIRROR_CATALOG_REQUEST_TIMEOUT_SECS", "30")?;
    let catalog_request_delay_ms = parse_u64("SHOWMIRROR_CATALOG_REQUEST_DELAY_MS", "250")?;

    let max_retries = parse_u32("SHOWMIRROR_MAX_RETRIES", "3")?;
    let retry_base_delay_ms = parse_u64("SHOWMIRROR_RETRY_BASE_DELAY_MS", "1000")?;
    let retry_backoff_factor = parse_f64("SHOWMIRROR_RETRY_BACKOFF_FACTOR", "2.0")?;
    if !retry_backoff_factor.is_finite() || retry_backoff_factor < 1.0 {
        return Err(invalid(
            "SHOWMIRROR_RETRY_BACKOFF_FACTOR",
            format!("must be a finite number >= 1.0, got {retry_backoff_factor}"),
        ));
    }
    let retry_max_delay_ms = parse_u64("SHOWMIRROR_RETRY_MAX_DELAY_MS", "60000")?;

    let max_concurrent_shows = parse_usize("SHOWMIRROR_MAX_CONCURRENT_SHOWS", "10")?;
    if max_concurrent_shows == 0 {
        return Err(invalid(
            "SHOWMIRROR_MAX_CONCURRENT_SHOWS",
            "must be at least 1".to_string(),
        ));
    }

    let update_schedule = or_default("SHOWMIRROR_UPDATE_SCHEDULE", "0 0 5 * * *");

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        catalog_base_url,
        catalog_user_agent,
        catalog_request_timeout_secs,
        catalog_request_delay_ms,
        max_retries,
        retry_base_delay_ms,
        retry_backoff_factor,
        retry_max_delay_ms,
        max_concurrent_shows,
        update_schedule,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SHOWMIRROR_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
