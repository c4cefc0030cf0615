use std::time::Duration;

use crate::services::open_meteo::{DEFAULT_FORECAST_URL, DEFAULT_GEOCODING_URL};

/// Port used when `PORT` is unset.
const DEFAULT_PORT: u16 = 8000;
/// Connect/command timeout for the external cache store.
const DEFAULT_CACHE_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a valid {expected}, got '{value}'")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub cache: CacheConfig,
    pub forecast_url: String,
    pub geocoding_url: String,
    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,
}

/// Inputs to the cache backend selection, see [`crate::cache::external_backend_url`].
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    pub redis_url: Option<String>,
    /// `CACHE_MEMORY_ONLY`: never try the external store.
    pub memory_only: bool,
    /// `CACHE_FORCE_REDIS`: try the external store even where it would be skipped.
    pub force_external: bool,
    /// Running on a hosted/serverless platform (Vercel, AWS Lambda).
    pub hosted: bool,
    pub timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                expected: "u16",
                value: raw.clone(),
            })?,
            None => DEFAULT_PORT,
        };

        let timeout_ms = match lookup("CACHE_TIMEOUT_MS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: "CACHE_TIMEOUT_MS",
                expected: "number of milliseconds",
                value: raw.clone(),
            })?,
            None => DEFAULT_CACHE_TIMEOUT_MS,
        };

        let cache = CacheConfig {
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            memory_only: lookup("CACHE_MEMORY_ONLY").is_some_and(|v| is_truthy(&v)),
            force_external: lookup("CACHE_FORCE_REDIS").is_some_and(|v| is_truthy(&v)),
            hosted: lookup("VERCEL").is_some() || lookup("AWS_LAMBDA_FUNCTION_NAME").is_some(),
            timeout: Duration::from_millis(timeout_ms),
        };

        Ok(Self {
            port,
            cache,
            forecast_url: lookup("OPEN_METEO_FORECAST_URL")
                .unwrap_or_else(|| DEFAULT_FORECAST_URL.to_string()),
            geocoding_url: lookup("OPEN_METEO_GEOCODING_URL")
                .unwrap_or_else(|| DEFAULT_GEOCODING_URL.to_string()),
            json_logs: lookup("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
