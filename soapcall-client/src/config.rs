use crate::wsdl_cache::WsdlCacheConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use soapcall_core::SoapVersion;
use soapcall_transport::TlsOptions;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("soapcall/", env!("CARGO_PKG_VERSION"));

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Endpoint URL; overrides the one found in a service description
    pub location: Option<String>,
    /// Target namespace; overrides the one found in a service description
    pub uri: Option<String>,
    pub soap_version: SoapVersion,
    /// Per-request timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Fallback when neither the call nor `timeout_ms` sets a timeout
    pub default_socket_timeout_ms: u64,
    pub keep_alive: bool,
    pub user_agent: String,
    pub login: Option<String>,
    pub password: Option<String>,
    pub tls: TlsOptions,
    pub wsdl_cache: WsdlCacheConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            location: None,
            uri: None,
            soap_version: SoapVersion::Soap11,
            timeout_ms: None,
            default_socket_timeout_ms: 60_000,
            keep_alive: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            login: None,
            password: None,
            tls: TlsOptions::default(),
            wsdl_cache: WsdlCacheConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Configuration for an endpoint used without a service description.
    pub fn for_endpoint(location: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            uri: Some(uri.into()),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse client configuration")
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read client configuration {}", path.display()))?;
        Self::from_json(&text)
    }

    /// Effective timeout for a call carrying its own optional override.
    pub fn request_timeout(&self, call_timeout_ms: Option<u64>) -> Duration {
        Duration::from_millis(
            call_timeout_ms
                .or(self.timeout_ms)
                .unwrap_or(self.default_socket_timeout_ms),
        )
    }

    pub fn basic_auth(&self) -> Option<(String, String)> {
        self.login
            .as_ref()
            .map(|login| (login.clone(), self.password.clone().unwrap_or_default()))
    }
}
