//! Client and cache configuration.

use crate::error::{Error, Result};
use crate::observability::RetentionPolicy;
use crate::strategy::FetchPolicy;
use std::time::Duration;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/";

/// Environment variable overriding the base URL.
pub const BASE_URL_ENV: &str = "SURVEY_MONITOR_BASE_URL";

/// Environment variable setting a request timeout in milliseconds.
pub const TIMEOUT_ENV: &str = "SURVEY_MONITOR_TIMEOUT_MS";

/// Configuration for the HTTP transport.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Whole-request timeout. `None` leaves requests unbounded.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `SURVEY_MONITOR_BASE_URL` and
    /// `SURVEY_MONITOR_TIMEOUT_MS` when set.
    pub fn from_env() -> Self {
        let mut config = ClientConfig::default();
        if let Some(url) = std::env::var(BASE_URL_ENV).ok().filter(|s| !s.trim().is_empty()) {
            config.base_url = url;
        }
        config.timeout = std::env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// # Errors
    /// Returns `Error::Config` for an empty or non-HTTP base URL, or a zero timeout.
    pub fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(Error::Config("base_url must not be empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "base_url must start with http:// or https:// (got '{}')",
                url
            )));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(Error::Config("timeout must be > 0".to_string()));
        }
        Ok(())
    }

    /// Absolute URL of a resource path: `<base_url>/<path>`.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Configuration for the query cache.
#[derive(Clone, Debug, Default)]
pub struct CacheConfig {
    pub retention: RetentionPolicy,
    /// Policy applied by [`QueryCache::subscribe`](crate::QueryCache::subscribe).
    pub fetch_policy: FetchPolicy,
}

impl CacheConfig {
    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.fetch_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000/api/");
        assert!(config.timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_url_for_joins_single_slash() {
        let config = ClientConfig::default();
        assert_eq!(
            config.url_for("stats/global/"),
            "http://localhost:8000/api/stats/global/"
        );

        let config = ClientConfig::default().with_base_url("https://survey.example.org/api");
        assert_eq!(
            config.url_for("/menages/"),
            "https://survey.example.org/api/menages/"
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ClientConfig::default().with_base_url("").validate().is_err());
        assert!(ClientConfig::default()
            .with_base_url("localhost:8000")
            .validate()
            .is_err());
        assert!(ClientConfig::default()
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::default()
            .with_retention(RetentionPolicy::Forever)
            .with_fetch_policy(FetchPolicy::RefetchOnSubscribe);
        assert!(matches!(config.retention, RetentionPolicy::Forever));
        assert_eq!(config.fetch_policy, FetchPolicy::RefetchOnSubscribe);
    }
}
