//! Asynchronous Virtualizor client implementation.

use crate::models::{
    parse_rule_list, parse_vm_list, ApiResponse, ForwardingRule, HaproxyConfig, VdfAction,
    VmInfo, ERROR_KEY, VM_LIST_KEY,
};
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use validator::Validate;
use virtualizor_core::{ClientConfig, Error, HostProfile, QueryEncoding, QueryParams};

const USER_AGENT: &str = concat!("virtualizor-api/", env!("CARGO_PKG_VERSION"));

const ACT_LIST_VMS: &str = "listvs";
const ACT_MANAGE_VDF: &str = "managevdf";

// `novnc=6710&do=add` renders the "add rule" form, which carries the HAProxy limits.
const CONFIG_PROBE_PARAMS: [(&str, &str); 2] = [("novnc", "6710"), ("do", "add")];

/// Builder for [`VirtualizorClient`].
#[derive(Debug, Clone)]
pub struct VirtualizorClientBuilder {
    base_url: String,
    api_key: String,
    api_pass: Arc<SecretString>,
    config: ClientConfig,
}

impl VirtualizorClientBuilder {
    /// Create a builder from a host profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the profile is invalid or its password cannot be decoded.
    pub fn new(profile: &HostProfile) -> Result<Self> {
        profile.validate()?;
        profile.parse_api_url()?;

        Ok(Self {
            base_url: profile.api_url.clone(),
            api_key: profile.api_key.clone(),
            api_pass: Arc::new(profile.get_decoded_pass()?),
            config: ClientConfig::new().with_user_agent(USER_AGENT),
        })
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }

    /// Enable or disable certificate verification bypass.
    #[must_use]
    pub fn with_insecure_skip_verify(mut self, skip: bool) -> Self {
        self.config = self.config.with_insecure_skip_verify(skip);
        self
    }

    /// Choose how query values are written into the URL.
    #[must_use]
    pub fn with_query_encoding(mut self, encoding: QueryEncoding) -> Self {
        self.config = self.config.with_query_encoding(encoding);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be created.
    pub fn build(self) -> Result<VirtualizorClient> {
        let http = self.config.build_http_client()?;
        Ok(VirtualizorClient {
            http,
            base_url: self.base_url,
            api_key: self.api_key,
            api_pass: self.api_pass,
            query_encoding: self.config.query_encoding,
        })
    }
}

/// Asynchronous Virtualizor client.
///
/// Holds only immutable configuration; every operation is one independent round trip.
#[derive(Debug, Clone)]
pub struct VirtualizorClient {
    http: Client,
    base_url: String,
    api_key: String,
    api_pass: Arc<SecretString>,
    query_encoding: QueryEncoding,
}

impl VirtualizorClient {
    /// Construct a client from a host profile with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the profile is invalid.
    pub fn new(profile: &HostProfile) -> Result<Self> {
        VirtualizorClientBuilder::new(profile)?.build()
    }

    /// Start a builder for the given profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the profile is invalid.
    pub fn builder(profile: &HostProfile) -> Result<VirtualizorClientBuilder> {
        VirtualizorClientBuilder::new(profile)
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the authenticated URL for `action` with extra query parameters.
    #[must_use]
    pub fn build_url(&self, action: &str, params: &[(&'static str, &str)]) -> String {
        let mut query =
            QueryParams::authenticated(action, &self.api_key, self.api_pass.expose_secret());
        query.extend(params);
        query.to_url(&self.base_url, self.query_encoding)
    }

    /// Check that the panel is reachable and accepts the credentials.
    ///
    /// # Errors
    ///
    /// Connection and authentication failures are returned unchanged; anything else is
    /// reported as [`Error::Connection`].
    pub async fn test_connection(&self) -> Result<bool> {
        match self.get(ACT_LIST_VMS, &[]).await {
            Ok(response) => {
                Ok(response.get(VM_LIST_KEY).is_some() || response.get(ERROR_KEY).is_none())
            }
            Err(err @ (Error::Connection(_) | Error::Authentication(_))) => Err(err),
            Err(err) => Err(Error::Connection(format!("Connection test failed: {err}"))),
        }
    }

    /// List all VMs visible to the API key.
    pub async fn list_vms(&self) -> Result<Vec<VmInfo>> {
        let response = self.get(ACT_LIST_VMS, &[]).await?;
        Ok(parse_vm_list(&response))
    }

    /// List forwarding rules configured for a VM.
    pub async fn get_forwarding(&self, vpsid: &str) -> Result<Vec<ForwardingRule>> {
        let response = self.get(ACT_MANAGE_VDF, &[("svs", vpsid)]).await?;
        Ok(parse_rule_list(&response))
    }

    /// Create a forwarding rule for a VM.
    pub async fn add_forwarding(&self, vpsid: &str, rule: &ForwardingRule) -> Result<ApiResponse> {
        let mut form = vec![("vdf_action", VdfAction::Add.as_str().to_string())];
        form.extend(rule.form_fields());
        self.post_vdf(vpsid, &form).await
    }

    /// Replace an existing forwarding rule.
    pub async fn edit_forwarding(
        &self,
        vpsid: &str,
        vdfid: &str,
        rule: &ForwardingRule,
    ) -> Result<ApiResponse> {
        let mut form = vec![
            ("vdf_action", VdfAction::Edit.as_str().to_string()),
            ("vdfid", vdfid.to_string()),
        ];
        form.extend(rule.form_fields());
        self.post_vdf(vpsid, &form).await
    }

    /// Delete one or more forwarding rules.
    pub async fn delete_forwarding(&self, vpsid: &str, vdfids: &[String]) -> Result<ApiResponse> {
        let form = vec![
            ("vdf_action", VdfAction::Delete.as_str().to_string()),
            ("ids", vdfids.join(",")),
        ];
        self.post_vdf(vpsid, &form).await
    }

    /// Read the HAProxy limits that apply to a VM's rules.
    pub async fn get_server_config(&self, vpsid: &str) -> Result<HaproxyConfig> {
        let mut params = vec![("svs", vpsid)];
        params.extend(CONFIG_PROBE_PARAMS);
        let response = self.get(ACT_MANAGE_VDF, &params).await?;
        HaproxyConfig::from_api_response(&response)
    }

    /// Look up the first IPv4 address of a VM by scanning the VM list.
    pub async fn get_vm_internal_ip(&self, vpsid: &str) -> Result<Option<String>> {
        let vms = self.list_vms().await?;
        Ok(vms
            .into_iter()
            .find(|vm| vm.vpsid == vpsid)
            .and_then(|vm| vm.ipv4))
    }

    async fn get(&self, action: &str, params: &[(&'static str, &str)]) -> Result<Value> {
        self.request(action, Method::GET, None, params).await
    }

    async fn post_vdf(&self, vpsid: &str, form: &[(&'static str, String)]) -> Result<ApiResponse> {
        let response = self
            .request(ACT_MANAGE_VDF, Method::POST, Some(form), &[("svs", vpsid)])
            .await?;
        Ok(ApiResponse::from_response(response))
    }

    async fn request(
        &self,
        action: &str,
        method: Method,
        form: Option<&[(&'static str, String)]>,
        params: &[(&'static str, &str)],
    ) -> Result<Value> {
        let url = self.build_url(action, params);

        info!(action, %method, "Sending Virtualizor request");
        debug!(?params, form_fields = form.map_or(0, <[_]>::len), "request details");

        let mut request = self.http.request(method, &url);
        if let Some(form) = form {
            request = request.form(form);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_client_error() || status.is_server_error() {
            debug!(%status, action, "Virtualizor request failed");
            return Err(Error::from_status(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|_| Error::Api("Invalid JSON response from API".to_string()))
    }
}

/// Operations offered by a Virtualizor panel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VirtualizorApi: Send + Sync {
    /// Check connectivity and credentials.
    async fn test_connection(&self) -> Result<bool>;

    /// List all VMs.
    async fn list_vms(&self) -> Result<Vec<VmInfo>>;

    /// List forwarding rules for a VM.
    async fn get_forwarding(&self, vpsid: &str) -> Result<Vec<ForwardingRule>>;

    /// Create a forwarding rule.
    async fn add_forwarding(&self, vpsid: &str, rule: &ForwardingRule) -> Result<ApiResponse>;

    /// Replace an existing forwarding rule.
    async fn edit_forwarding(
        &self,
        vpsid: &str,
        vdfid: &str,
        rule: &ForwardingRule,
    ) -> Result<ApiResponse>;

    /// Delete forwarding rules.
    async fn delete_forwarding(&self, vpsid: &str, vdfids: &[String]) -> Result<ApiResponse>;

    /// Read the HAProxy limits for a VM.
    async fn get_server_config(&self, vpsid: &str) -> Result<HaproxyConfig>;

    /// Look up a VM's internal IPv4 address.
    async fn get_vm_internal_ip(&self, vpsid: &str) -> Result<Option<String>>;
}

#[async_trait]
impl VirtualizorApi for VirtualizorClient {
    async fn test_connection(&self) -> Result<bool> {
        VirtualizorClient::test_connection(self).await
    }

    async fn list_vms(&self) -> Result<Vec<VmInfo>> {
        VirtualizorClient::list_vms(self).await
    }

    async fn get_forwarding(&self, vpsid: &str) -> Result<Vec<ForwardingRule>> {
        VirtualizorClient::get_forwarding(self, vpsid).await
    }

    async fn add_forwarding(&self, vpsid: &str, rule: &ForwardingRule) -> Result<ApiResponse> {
        VirtualizorClient::add_forwarding(self, vpsid, rule).await
    }

    async fn edit_forwarding(
        &self,
        vpsid: &str,
        vdfid: &str,
        rule: &ForwardingRule,
    ) -> Result<ApiResponse> {
        VirtualizorClient::edit_forwarding(self, vpsid, vdfid, rule).await
    }

    async fn delete_forwarding(&self, vpsid: &str, vdfids: &[String]) -> Result<ApiResponse> {
        VirtualizorClient::delete_forwarding(self, vpsid, vdfids).await
    }

    async fn get_server_config(&self, vpsid: &str) -> Result<HaproxyConfig> {
        VirtualizorClient::get_server_config(self, vpsid).await
    }

    async fn get_vm_internal_ip(&self, vpsid: &str) -> Result<Option<String>> {
        VirtualizorClient::get_vm_internal_ip(self, vpsid).await
    }
}
