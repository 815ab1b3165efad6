//! HTTP transport backed by reqwest.

use super::Transport;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::params::QueryParams;
use serde_json::Value;

/// HTTP transport for the survey API.
///
/// Cloning is cheap: the underlying `reqwest::Client` shares its connection
/// pool across clones.
///
/// # Example
///
/// ```no_run
/// use survey_monitor::client::{ApiClient, HttpTransport};
/// use survey_monitor::config::ClientConfig;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let transport = HttpTransport::new(ClientConfig::from_env())?;
///     let client = ApiClient::new(transport);
///
///     let stats = client.global_stats().await?;
///     println!("{:?}", stats.collected);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// # Errors
    /// Returns `Error::Config` if the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        info!("✓ HTTP transport ready for {}", config.base_url);
        Ok(HttpTransport { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Transport for HttpTransport {
    async fn get(&self, path: &str, params: &QueryParams) -> Result<Value> {
        let url = self.config.url_for(path);
        let mut request = self.client.get(&url);
        if !params.is_empty() {
            request = request.query(params.pairs());
        }

        debug!("→ GET {} {}", url, params.canonical());
        let response = request.send().await.map_err(|e| {
            warn!("✗ GET {} failed: {}", url, e);
            Error::from(e)
        })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("✗ GET {} -> {}", url, status.as_u16());
            return Err(Error::http(status.as_u16(), body));
        }

        debug!("✓ GET {} -> {} ({} bytes)", url, status.as_u16(), body.len());
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_http_transport_creation() {
        let transport = HttpTransport::new(ClientConfig::default()).expect("Failed to build");
        assert_eq!(transport.config().base_url, "http://localhost:8000/api/");
    }

    #[test]
    fn test_http_transport_with_timeout() {
        let config = ClientConfig::default().with_timeout(Duration::from_secs(5));
        assert!(HttpTransport::new(config).is_ok());
    }

    #[test]
    fn test_http_transport_rejects_invalid_config() {
        let result = HttpTransport::new(ClientConfig::default().with_base_url("ftp://nope"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
