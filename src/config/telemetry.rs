//! Telemetry configuration

use serde::Deserialize;

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Environment name
    #[serde(default)]
    pub environment: Environment,

    /// Log filter directive, overridden by `RUST_LOG` when set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines; defaults to on in production
    pub json_logs: Option<bool>,
}

/// Deployment environment
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl TelemetryConfig {
    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Whether log lines are emitted as JSON
    pub fn use_json(&self) -> bool {
        self.json_logs.unwrap_or_else(|| self.is_production())
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            log_level: default_log_level(),
            json_logs: None,
        }
    }
}

fn default_log_level() -> String {
    "info,event_bus=debug".to_string()
}
