//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub summarizer_url: String,
    pub messaging_url: String,
    pub http_timeout: Duration,
    /// `None` keeps pending summary requests until the worker reports back.
    pub pending_ttl: Option<Duration>,
    /// Shared secret the summarization worker must send with its callbacks.
    pub callback_token: Option<String>,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Outbound Workers ---
        let summarizer_url = lookup("SUMMARIZER_URL")
            .unwrap_or_else(|| "http://localhost:8000".to_string())
            .trim_end_matches('/')
            .to_string();
        let messaging_url = lookup("MESSAGING_URL")
            .unwrap_or_else(|| "http://localhost:5000".to_string())
            .trim_end_matches('/')
            .to_string();
        let http_timeout = Duration::from_secs(parse_secs(&lookup, "HTTP_TIMEOUT_SECS")?.unwrap_or(10));

        // --- Summary Queue ---
        let pending_ttl = match parse_secs(&lookup, "PENDING_TTL_SECS")? {
            None | Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        };
        let callback_token = lookup("CALLBACK_TOKEN").filter(|t| !t.is_empty());

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            summarizer_url,
            messaging_url,
            http_timeout,
            pending_ttl,
            callback_token,
            cors_origin,
        })
    }
}

fn parse_secs<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/insight")]).unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.summarizer_url, "http://localhost:8000");
        assert_eq!(config.messaging_url, "http://localhost:5000");
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert!(config.pending_ttl.is_none());
        assert!(config.callback_token.is_none());
    }

    #[test]
    fn database_url_is_required() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "DATABASE_URL"));
    }

    #[test]
    fn worker_urls_and_ttl_are_read() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db"),
            ("SUMMARIZER_URL", "http://summarizer:8000/"),
            ("PENDING_TTL_SECS", "600"),
            ("CALLBACK_TOKEN", "s3cret"),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();

        assert_eq!(config.summarizer_url, "http://summarizer:8000");
        assert_eq!(config.pending_ttl, Some(Duration::from_secs(600)));
        assert_eq!(config.callback_token.as_deref(), Some("s3cret"));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn zero_ttl_disables_expiry() {
        let config = load(&[("DATABASE_URL", "postgres://db"), ("PENDING_TTL_SECS", "0")]).unwrap();
        assert!(config.pending_ttl.is_none());
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = load(&[("DATABASE_URL", "postgres://db"), ("BIND_ADDRESS", "nowhere")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "BIND_ADDRESS"));

        let err = load(&[("DATABASE_URL", "postgres://db"), ("HTTP_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "HTTP_TIMEOUT_SECS"));
    }
}
