//! HTTP client settings for talking to a Virtualizor panel.
//!
//! Panels are usually reached over HTTPS with a self-signed certificate, so TLS
//! verification is off unless the caller opts back in.

use crate::{Error, Result};
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::warn;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How caller-supplied query values are written into the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryEncoding {
    /// Percent-encode values (`a&b` becomes `a%26b`).
    #[default]
    Encoded,
    /// Concatenate values verbatim, for panels that expect unescaped input.
    Raw,
}

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,

    /// Accept self-signed and otherwise invalid certificates
    pub insecure_skip_verify: bool,

    /// Query value encoding
    pub query_encoding: QueryEncoding,

    /// User-Agent header value
    pub user_agent: Option<String>,
}

impl ClientConfig {
    /// Create a new client configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            insecure_skip_verify: true,
            query_encoding: QueryEncoding::Encoded,
            user_agent: None,
        }
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable certificate verification bypass.
    #[must_use]
    pub const fn with_insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }

    /// Set query value encoding.
    #[must_use]
    pub const fn with_query_encoding(mut self, encoding: QueryEncoding) -> Self {
        self.query_encoding = encoding;
        self
    }

    /// Set the User-Agent header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build a [`reqwest::Client`] honouring this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the TLS backend cannot be initialised.
    pub fn build_http_client(&self) -> Result<Client> {
        let mut builder = ClientBuilder::new().timeout(self.timeout);

        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        if self.insecure_skip_verify {
            warn!("TLS verification disabled for Virtualizor client");
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder
            .build()
            .map_err(|err| Error::Config(format!("Failed to build HTTP client: {err}")))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_constants() {
        assert_eq!(DEFAULT_TIMEOUT_SECS, 30);
    }

    #[test]
    fn test_client_config_new() {
        let config = ClientConfig::new();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.insecure_skip_verify);
        assert_eq!(config.query_encoding, QueryEncoding::Encoded);
        assert!(config.user_agent.is_none());
    }

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(QueryEncoding::default(), QueryEncoding::Encoded);
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new()
            .with_timeout(Duration::from_secs(5))
            .with_insecure_skip_verify(false)
            .with_query_encoding(QueryEncoding::Raw)
            .with_user_agent("test-agent/1.0");

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.insecure_skip_verify);
        assert_eq!(config.query_encoding, QueryEncoding::Raw);
        assert_eq!(config.user_agent.as_deref(), Some("test-agent/1.0"));
    }

    #[test]
    fn test_build_http_client() {
        assert!(ClientConfig::new().build_http_client().is_ok());
        assert!(ClientConfig::new()
            .with_insecure_skip_verify(false)
            .build_http_client()
            .is_ok());
    }
}
