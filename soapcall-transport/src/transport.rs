use crate::request::PreparedRequest;
use async_trait::async_trait;
use bytes::Bytes;
use soapcall_core::{ConnectionId, SoapError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("operation timed out: {0}")]
    Timeout(String),
    #[error("could not connect: {0}")]
    Connect(String),
    #[error("TLS configuration error: {0}")]
    Tls(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::TimedOut {
            TransportError::Timeout(err.to_string())
        } else {
            TransportError::Io(err.to_string())
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        // a connect timeout reports both flags; the timeout wins
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_builder() {
            TransportError::InvalidUrl(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Timeout-class errors become `Timeout` faults, everything else a generic
/// transport (`Server`) fault.
impl From<TransportError> for SoapError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(message) => SoapError::Timeout(message),
            other => SoapError::Transport(other.to_string()),
        }
    }
}

/// Diagnostics of one completed exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferInfo {
    pub url: String,
    pub status: Option<u16>,
    pub total_time: Duration,
    pub connection: Option<ConnectionId>,
    pub bytes_received: usize,
}

/// A response as handed back by a transport: HTTP framing already split off.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResponse {
    pub status: Option<u16>,
    pub reason: Option<String>,
    /// In wire order; repeated names (such as `Set-Cookie`) are kept.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub info: TransferInfo,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Status line plus header lines, as they would appear on the wire.
    pub fn header_block(&self) -> String {
        let mut block = String::new();
        if let Some(status) = self.status {
            block.push_str(&format!(
                "HTTP/1.1 {} {}\r\n",
                status,
                self.reason.as_deref().unwrap_or_default()
            ));
        }
        for (key, value) in &self.headers {
            block.push_str(&format!("{}: {}\r\n", key, value));
        }
        block
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform the exchange described by `request` and wait for the full body.
    async fn execute(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError>;
}
