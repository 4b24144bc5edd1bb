//! Application configuration from environment variables.

use crate::crm::CrmSnapshot;
use crate::matrix::{GoogleMatrixConfig, RetryPolicy, Units, GOOGLE_DISTANCE_MATRIX_URL};
use std::env::VarError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub maps: GoogleMatrixConfig,
    pub max_destinations: usize,
    pub retry: RetryPolicy,
    pub request_deadline: Duration,
    pub crm_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Expose failure detail to clients.
    pub debug: bool,
}

/// Load configuration, reading `.env` first if present.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_app_config(|key| std::env::var(key))
}

/// Build configuration from an env-var lookup, so tests can pass a map.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let api_key = require("LEADLOC_MAPS_API_KEY")?;
    let base_url = or_default("LEADLOC_MAPS_BASE_URL", GOOGLE_DISTANCE_MATRIX_URL);
    let timeout = Duration::from_secs(parse_u64("LEADLOC_MAPS_TIMEOUT_SECS", "10")?);
    let units = or_default("LEADLOC_MAPS_UNITS", "metric")
        .parse::<Units>()
        .map_err(|reason| ConfigError::InvalidEnvVar {
            var: "LEADLOC_MAPS_UNITS".into(),
            reason,
        })?;

    let max_destinations = parse_u64("LEADLOC_MAPS_MAX_DESTINATIONS", "25")? as usize;
    if max_destinations == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "LEADLOC_MAPS_MAX_DESTINATIONS".into(),
            reason: "must be at least 1".into(),
        });
    }

    let max_retries = parse_u64("LEADLOC_MAPS_MAX_RETRIES", "2")?;
    let retry = RetryPolicy {
        max_retries: u32::try_from(max_retries).map_err(|e| ConfigError::InvalidEnvVar {
            var: "LEADLOC_MAPS_MAX_RETRIES".into(),
            reason: e.to_string(),
        })?,
        backoff_base_ms: parse_u64("LEADLOC_MAPS_RETRY_BACKOFF_MS", "500")?,
    };

    let request_deadline = Duration::from_secs(parse_u64("LEADLOC_REQUEST_DEADLINE_SECS", "30")?);

    let crm_path = lookup("LEADLOC_CRM_FIXTURE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| CrmSnapshot::default_path());

    let bind_raw = or_default("LEADLOC_BIND_ADDR", "127.0.0.1:3000");
    let bind_addr = bind_raw
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: "LEADLOC_BIND_ADDR".into(),
            reason: e.to_string(),
        })?;

    let log_level = or_default("LEADLOC_LOG_LEVEL", "info");
    let debug = parse_flag(&or_default("LEADLOC_DEBUG", "false"));

    Ok(AppConfig {
        maps: GoogleMatrixConfig {
            api_key,
            base_url,
            timeout,
            units,
        },
        max_destinations,
        retry,
        request_deadline,
        crm_path,
        bind_addr,
        log_level,
        debug,
    })
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
