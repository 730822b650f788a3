use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use humantime_serde::re::humantime;
use thiserror::Error;

use crate::generator::{GenerationSettings, DEFAULT_TIMEOUT};
use crate::rate_limit_config::RateLimitSettings;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:7071";

/// Preferred storage connection variable
pub const TARGET_STORAGE_VAR: &str = "TARGET_STORAGE_CONNECTION_STRING";
/// Storage variable provided by the hosting platform
pub const PLATFORM_STORAGE_VAR: &str = "AzureWebJobsStorage";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("invalid rate limit settings: {0}")]
    RateLimit(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub bind_addr: SocketAddr,

    /// Default log level when `RUST_LOG` is not set
    pub log_level: String,

    /// Storage connection string, if any
    pub storage_connection: Option<String>,

    pub generation: GenerationSettings,

    pub rate_limit: RateLimitSettings,

    /// Optional JSON file replacing the built-in style catalog
    pub styles_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7071)),
            log_level: "info".to_string(),
            storage_connection: None,
            generation: GenerationSettings::default(),
            rate_limit: RateLimitSettings::default(),
            styles_path: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr: SocketAddr = match var("BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|e| invalid("BIND_ADDR", e))?,
            None => Config::default().bind_addr,
        };

        let log_level = var("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let storage_connection = var(TARGET_STORAGE_VAR).or_else(|| var(PLATFORM_STORAGE_VAR));

        let timeout = match var("IMAGE_API_TIMEOUT") {
            Some(raw) => parse_duration("IMAGE_API_TIMEOUT", &raw)?,
            None => DEFAULT_TIMEOUT,
        };
        let generation = GenerationSettings {
            api_key: var("IMAGE_API_KEY"),
            endpoint: var("IMAGE_API_ENDPOINT"),
            model: var("IMAGE_API_MODEL"),
            timeout: Some(timeout),
        };

        let mut rate_limit = RateLimitSettings::default();
        if let Some(raw) = var("RATE_LIMIT_REQUESTS") {
            rate_limit.limit = raw.parse().map_err(|e| invalid("RATE_LIMIT_REQUESTS", e))?;
        }
        if let Some(raw) = var("RATE_LIMIT_WINDOW") {
            rate_limit.window = parse_duration("RATE_LIMIT_WINDOW", &raw)?;
        }
        rate_limit.validate().map_err(ConfigError::RateLimit)?;

        Ok(Self {
            bind_addr,
            log_level,
            storage_connection,
            generation,
            rate_limit,
            styles_path: var("STYLE_CATALOG_PATH").map(PathBuf::from),
        })
    }
}

fn parse_duration(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw).map_err(|e| invalid(key, e))
}

fn invalid(key: &str, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.log_level, "info");
        assert!(config.storage_connection.is_none());
        assert!(!config.generation.is_configured());
        assert_eq!(config.generation.timeout, Some(DEFAULT_TIMEOUT));
        assert_eq!(config.rate_limit, RateLimitSettings::default());
        assert!(config.styles_path.is_none());
    }

    #[test]
    fn test_target_storage_preferred() {
        let config = load(&[
            (PLATFORM_STORAGE_VAR, "AccountName=platform;AccountKey=k"),
            (TARGET_STORAGE_VAR, "AccountName=target;AccountKey=k"),
        ])
        .unwrap();
        assert_eq!(
            config.storage_connection.as_deref(),
            Some("AccountName=target;AccountKey=k")
        );

        let config = load(&[
            (PLATFORM_STORAGE_VAR, "AccountName=platform;AccountKey=k"),
            (TARGET_STORAGE_VAR, "   "),
        ])
        .unwrap();
        assert_eq!(
            config.storage_connection.as_deref(),
            Some("AccountName=platform;AccountKey=k")
        );
    }

    #[test]
    fn test_generation_and_rate_limit_values() {
        let config = load(&[
            ("IMAGE_API_KEY", "secret"),
            ("IMAGE_API_ENDPOINT", "https://images.example.com/edit"),
            ("IMAGE_API_TIMEOUT", "45s"),
            ("RATE_LIMIT_REQUESTS", "10"),
            ("RATE_LIMIT_WINDOW", "5m"),
        ])
        .unwrap();
        assert!(config.generation.is_configured());
        assert_eq!(config.generation.timeout, Some(Duration::from_secs(45)));
        assert_eq!(config.rate_limit.limit, 10);
        assert_eq!(config.rate_limit.window, Duration::from_secs(300));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("BIND_ADDR", "not-an-address")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            load(&[("RATE_LIMIT_REQUESTS", "0")]),
            Err(ConfigError::RateLimit(_))
        ));
        assert!(matches!(
            load(&[("RATE_LIMIT_WINDOW", "soon")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
