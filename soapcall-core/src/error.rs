use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// A fault reported by the remote service (a `Fault` element in the response
/// envelope, or an HTTP error status without a parsable envelope).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl Fault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Fault {
            code: code.into(),
            message: message.into(),
            actor: None,
            detail: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Every failure a SOAP call or batch can produce.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SoapError {
    /// `run_batch` was entered while another batch was capturing or executing.
    #[error("batch already in progress; nested batches are not supported")]
    Nesting,
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("application fault {0}")]
    Application(Fault),
    #[error("WSDL cache I/O error: {0}")]
    CacheIo(String),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("client error: {0}")]
    Client(String),
    #[error("WSDL error: {0}")]
    Wsdl(String),
}

impl SoapError {
    pub fn application(code: impl Into<String>, message: impl Into<String>) -> Self {
        SoapError::Application(Fault::new(code, message))
    }

    pub fn codec(message: impl Into<String>) -> Self {
        SoapError::Codec(message.into())
    }

    pub fn client(message: impl Into<String>) -> Self {
        SoapError::Client(message.into())
    }

    /// Fault code in SOAP vocabulary, as a caller inspecting `faultcode` would see it.
    pub fn fault_code(&self) -> &str {
        match self {
            SoapError::Nesting | SoapError::Client(_) => "Client",
            SoapError::Timeout(_) => "Timeout",
            SoapError::Transport(_) => "Server",
            SoapError::Application(fault) => &fault.code,
            SoapError::CacheIo(_) => "CacheIO",
            SoapError::Codec(_) => "Client",
            SoapError::Wsdl(_) => "WSDL",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SoapError::Timeout(_))
    }

    pub fn as_fault(&self) -> Option<&Fault> {
        match self {
            SoapError::Application(fault) => Some(fault),
            _ => None,
        }
    }
}

impl From<Fault> for SoapError {
    fn from(fault: Fault) -> Self {
        SoapError::Application(fault)
    }
}

impl From<quick_xml::Error> for SoapError {
    fn from(err: quick_xml::Error) -> Self {
        SoapError::Codec(format!("XML error: {}", err))
    }
}

impl From<serde_json::Error> for SoapError {
    fn from(err: serde_json::Error) -> Self {
        SoapError::Client(format!("JSON error: {}", err))
    }
}
