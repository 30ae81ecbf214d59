//! Error types for Virtualizor operations.
//!
//! Whole-call failures are split into three API kinds (connection, authentication and
//! generic API failures). Configuration and per-record parse failures get their own
//! variants so callers can tell them apart from transport problems.

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Main error type for Virtualizor operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Network-level failure: timeout or refused/unreachable connection
    #[error("{0}")]
    Connection(String),

    /// The panel rejected the API key or password (HTTP 401)
    #[error("{0}")]
    Authentication(String),

    /// Any other failed API call: bad status, non-JSON body, unexpected error
    #[error("{0}")]
    Api(String),

    /// Invalid host profile or client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single vendor record could not be mapped onto a typed value
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Specialized result type for Virtualizor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl Error {
    /// Connection failure naming the panel URL and the underlying cause.
    #[must_use]
    pub fn connection_failed(base_url: &str, cause: impl std::fmt::Display) -> Self {
        Self::Connection(format!(
            "Failed to connect to API:\n  URL: {base_url}\n  Error: {cause}\n\
             Please verify the API URL and network connectivity."
        ))
    }

    /// Connection failure caused by the request timing out.
    #[must_use]
    pub fn timed_out(base_url: &str) -> Self {
        Self::Connection(format!(
            "Connection timeout ({base_url}). Please check:\n  - Network connectivity\n  \
             - API URL is correct\n  - Server is responding"
        ))
    }

    /// Authentication failure with credential hints.
    #[must_use]
    pub fn authentication_failed() -> Self {
        Self::Authentication(
            "Authentication failed. Please verify:\n  - API Key is correct\n  \
             - API Password is correct"
                .to_string(),
        )
    }

    /// Maps a non-success HTTP status to the matching error kind.
    #[must_use]
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Self::authentication_failed(),
            _ if body.trim().is_empty() => Self::Api(format!("HTTP error: {status}")),
            _ => Self::Api(format!("HTTP error: {status}: {}", body.trim())),
        }
    }

    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::Authentication(_) => "AUTHENTICATION_ERROR",
            Self::Api(_) => "API_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Parse(_) => "PARSE_ERROR",
        }
    }

    /// Returns true for failures raised by an API call.
    #[must_use]
    pub const fn is_api_error(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Authentication(_) | Self::Api(_)
        )
    }

    /// Converts the error into an `ErrorResponse`.
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
        }
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Credentials travel in the query string; keep only scheme, host and path.
        let base = err
            .url()
            .map(|u| u[..url::Position::AfterPath].to_string())
            .unwrap_or_default();
        let err = err.without_url();

        if err.is_timeout() {
            Self::timed_out(&base)
        } else if err.is_connect() {
            Self::connection_failed(&base, &err)
        } else if err.is_decode() {
            Self::Api("Invalid JSON response from API".to_string())
        } else {
            Self::Api(format!("API request failed: {err}"))
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::Config(format!("Invalid API URL: {err}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Api(format!("Invalid JSON response from API: {err}"))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::Config(format!("API password is not valid base64: {err}"))
    }
}
