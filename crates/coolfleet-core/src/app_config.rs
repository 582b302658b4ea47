use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::Duration;

use crate::breach::BreachPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub zones_path: Option<PathBuf>,
    pub mock_coolers: usize,
    pub mock_seed: Option<u64>,
    pub default_radius_meters: f64,
    pub breach_exit_confirmations: u32,
    pub breach_return_confirmations: u32,
    pub offline_after_secs: u64,
    pub idle_after_secs: u64,
    pub telemetry_cron: String,
    pub telemetry_enabled: bool,
    pub mapbox_access_token: Option<String>,
}

impl AppConfig {
    #[must_use]
    pub fn is_development(&self) -> bool {
        self.env == Environment::Development
    }

    /// Breach thresholds for the monitor. Idle tolerance keeps its default.
    #[must_use]
    pub fn breach_policy(&self) -> BreachPolicy {
        BreachPolicy {
            exit_confirmations: self.breach_exit_confirmations,
            return_confirmations: self.breach_return_confirmations,
            offline_after: secs(self.offline_after_secs),
            idle_after: secs(self.idle_after_secs),
            ..BreachPolicy::default()
        }
    }
}

fn secs(value: u64) -> Duration {
    Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX).min(i64::MAX / 1_000))
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("zones_path", &self.zones_path)
            .field("mock_coolers", &self.mock_coolers)
            .field("mock_seed", &self.mock_seed)
            .field("default_radius_meters", &self.default_radius_meters)
            .field("breach_exit_confirmations", &self.breach_exit_confirmations)
            .field(
                "breach_return_confirmations",
                &self.breach_return_confirmations,
            )
            .field("offline_after_secs", &self.offline_after_secs)
            .field("idle_after_secs", &self.idle_after_secs)
            .field("telemetry_cron", &self.telemetry_cron)
            .field("telemetry_enabled", &self.telemetry_enabled)
            .field(
                "mapbox_access_token",
                &self.mapbox_access_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}
