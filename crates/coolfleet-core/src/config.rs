use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
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
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every variable has a default, so an empty environment yields a usable
/// development config.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
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

    let env = parse_environment(&or_default("COOLFLEET_ENV", "development"))?;

    let bind_addr = or_default("COOLFLEET_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("COOLFLEET_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("COOLFLEET_LOG_LEVEL", "info");
    let zones_path = optional("COOLFLEET_ZONES_PATH").map(PathBuf::from);

    let mock_coolers = or_default("COOLFLEET_MOCK_COOLERS", "200")
        .parse::<usize>()
        .map_err(|e| invalid("COOLFLEET_MOCK_COOLERS", e.to_string()))?;
    let mock_seed = optional("COOLFLEET_MOCK_SEED")
        .map(|raw| {
            raw.parse::<u64>()
                .map_err(|e| invalid("COOLFLEET_MOCK_SEED", e.to_string()))
        })
        .transpose()?;

    let default_radius_meters = or_default("COOLFLEET_DEFAULT_RADIUS_M", "300")
        .parse::<f64>()
        .map_err(|e| invalid("COOLFLEET_DEFAULT_RADIUS_M", e.to_string()))?;
    if !default_radius_meters.is_finite() || default_radius_meters <= 0.0 {
        return Err(invalid(
            "COOLFLEET_DEFAULT_RADIUS_M",
            format!("must be a positive number of meters, got {default_radius_meters}"),
        ));
    }

    let breach_exit_confirmations = parse_u32("COOLFLEET_BREACH_EXIT_CONFIRMATIONS", "2")?;
    let breach_return_confirmations = parse_u32("COOLFLEET_BREACH_RETURN_CONFIRMATIONS", "2")?;
    for (var, value) in [
        ("COOLFLEET_BREACH_EXIT_CONFIRMATIONS", breach_exit_confirmations),
        ("COOLFLEET_BREACH_RETURN_CONFIRMATIONS", breach_return_confirmations),
    ] {
        if value == 0 {
            return Err(invalid(var, "must be at least 1".to_string()));
        }
    }

    let offline_after_secs = parse_u64("COOLFLEET_OFFLINE_AFTER_SECS", "1800")?;
    let idle_after_secs = parse_u64("COOLFLEET_IDLE_AFTER_SECS", "604800")?;

    let telemetry_cron = or_default("COOLFLEET_TELEMETRY_CRON", "0 * * * * *");
    if telemetry_cron.trim().is_empty() {
        return Err(invalid(
            "COOLFLEET_TELEMETRY_CRON",
            "must not be empty".to_string(),
        ));
    }
    let telemetry_enabled = match optional("COOLFLEET_TELEMETRY_ENABLED") {
        Some(raw) => parse_bool(&raw).ok_or_else(|| {
            invalid(
                "COOLFLEET_TELEMETRY_ENABLED",
                format!("expected true/false, got '{raw}'"),
            )
        })?,
        None => env == Environment::Development,
    };

    let mapbox_access_token = optional("MAPBOX_ACCESS_TOKEN");

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        zones_path,
        mock_coolers,
        mock_seed,
        default_radius_meters,
        breach_exit_confirmations,
        breach_return_confirmations,
        offline_after_secs,
        idle_after_secs,
        telemetry_cron,
        telemetry_enabled,
        mapbox_access_token,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "COOLFLEET_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
