//! Sync configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BASKET_API_URL` - Base URL of the remote cart/wishlist API
//!
//! ## Optional
//! - `BASKET_REFRESH_INTERVAL_SECS` - Poll interval while signed in (default: 30)
//! - `BASKET_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `BASKET_MAX_UNCONFIRMED` - Optimistic adjustments per domain before a
//!   refresh is forced, `0` disables (default: 3)
//! - `BASKET_SESSION_FILE` - Path of the persisted session (token + user record)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate (default: 1.0)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_UNCONFIRMED: u32 = 3;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Sync client configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the remote store; endpoint paths are joined onto it
    pub api_url: Url,
    /// Interval between timer-triggered refreshes
    pub refresh_interval: Duration,
    /// Timeout applied to every remote store request
    pub request_timeout: Duration,
    /// Unconfirmed adjustments per domain that force a refresh (0 = never)
    pub max_unconfirmed: u32,
    /// Where the session is persisted, if anywhere
    pub session_file: Option<PathBuf>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
}

impl SyncConfig {
    /// Configuration with defaults for everything but the API URL.
    ///
    /// A trailing slash is added to the URL path so that relative endpoint
    /// paths join under it rather than replacing its last segment.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url: with_trailing_slash(api_url),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_unconfirmed: DEFAULT_MAX_UNCONFIRMED,
            session_file: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let api_url = env.required("BASKET_API_URL")?;
        let api_url = Url::parse(&api_url)
            .map_err(|e| ConfigError::InvalidEnvVar("BASKET_API_URL".to_string(), e.to_string()))?;

        let mut config = Self::new(api_url);
        config.refresh_interval = Duration::from_secs(
            env.parsed_or("BASKET_REFRESH_INTERVAL_SECS", DEFAULT_REFRESH_INTERVAL_SECS)?,
        );
        if config.refresh_interval.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "BASKET_REFRESH_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        config.request_timeout = Duration::from_secs(
            env.parsed_or("BASKET_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
        );
        config.max_unconfirmed = env.parsed_or("BASKET_MAX_UNCONFIRMED", DEFAULT_MAX_UNCONFIRMED)?;
        config.session_file = env.optional("BASKET_SESSION_FILE").map(PathBuf::from);
        config.sentry_dsn = env.optional("SENTRY_DSN");
        config.sentry_environment = env.optional("SENTRY_ENVIRONMENT");
        config.sentry_sample_rate = env.parsed_or("SENTRY_SAMPLE_RATE", 1.0)?;

        Ok(config)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional variable. Empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Parse a variable, falling back to a default when unset.
    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            SyncConfig::from_lookup(lookup(&[("BASKET_API_URL", "https://api.example.test/api")]))
                .unwrap();
        assert_eq!(config.api_url.as_str(), "https://api.example.test/api/");
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.max_unconfirmed, 3);
        assert!(config.session_file.is_none());
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_missing_api_url() {
        let err = SyncConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "BASKET_API_URL"));
    }

    #[test]
    fn test_invalid_api_url() {
        let err = SyncConfig::from_lookup(lookup(&[("BASKET_API_URL", "not a url")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_overrides() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("BASKET_API_URL", "http://127.0.0.1:8080/api/"),
            ("BASKET_REFRESH_INTERVAL_SECS", "5"),
            ("BASKET_REQUEST_TIMEOUT_SECS", "2"),
            ("BASKET_MAX_UNCONFIRMED", "0"),
            ("BASKET_SESSION_FILE", "/tmp/basket-session.json"),
            ("SENTRY_SAMPLE_RATE", "0.25"),
        ]))
        .unwrap();
        assert_eq!(config.api_url.as_str(), "http://127.0.0.1:8080/api/");
        assert_eq!(config.refresh_interval, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.max_unconfirmed, 0);
        assert_eq!(
            config.session_file,
            Some(PathBuf::from("/tmp/basket-session.json"))
        );
        assert!((config.sentry_sample_rate - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = SyncConfig::from_lookup(lookup(&[
            ("BASKET_API_URL", "http://127.0.0.1:8080"),
            ("BASKET_REFRESH_INTERVAL_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "BASKET_REFRESH_INTERVAL_SECS"));
    }

    #[test]
    fn test_non_numeric_interval_rejected() {
        let err = SyncConfig::from_lookup(lookup(&[
            ("BASKET_API_URL", "http://127.0.0.1:8080"),
            ("BASKET_REFRESH_INTERVAL_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }
}
