//! Host profile configuration.
//!
//! A [`HostProfile`] names one Virtualizor panel and carries the credentials used to
//! reach it. The API password is stored base64-encoded, the way profile files keep it
//! on disk, and is only decoded when a client is built.

use crate::Error;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

/// Connection details and credentials for a single Virtualizor panel.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct HostProfile {
    /// Profile name
    #[validate(length(min = 1))]
    pub name: String,

    /// Panel API endpoint (e.g., "https://panel.example.com:4085/index.php")
    #[validate(url)]
    pub api_url: String,

    /// API key
    #[validate(length(min = 1))]
    pub api_key: String,

    /// Base64-encoded API password
    #[serde(skip_serializing)]
    #[validate(length(min = 1))]
    pub api_pass: String,
}

impl HostProfile {
    /// Create a profile from a plain-text API password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any field is empty or the URL is invalid.
    pub fn new(
        name: impl Into<String>,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        api_pass: &str,
    ) -> Result<Self, Error> {
        Self::from_encoded(name, api_url, api_key, STANDARD.encode(api_pass))
    }

    /// Create a profile from an already base64-encoded API password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any field is empty or the URL is invalid.
    pub fn from_encoded(
        name: impl Into<String>,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        encoded_pass: impl Into<String>,
    ) -> Result<Self, Error> {
        let profile = Self {
            name: name.into(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            api_pass: encoded_pass.into(),
        };

        profile
            .validate()
            .map_err(|e| Error::Config(format!("Invalid host profile: {e}")))?;

        Ok(profile)
    }

    /// Decode the stored API password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the stored value is not base64 or not UTF-8.
    pub fn get_decoded_pass(&self) -> Result<SecretString, Error> {
        let bytes = STANDARD.decode(self.api_pass.trim())?;
        let pass = String::from_utf8(bytes)
            .map_err(|e| Error::Config(format!("API password is not valid UTF-8: {e}")))?;
        Ok(SecretString::from(pass))
    }

    /// Parse and validate the API URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_api_url(&self) -> Result<Url, Error> {
        Url::parse(&self.api_url).map_err(Error::from)
    }
}
