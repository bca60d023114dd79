use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// SOAP protocol version; selects envelope namespace and HTTP framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SoapVersion {
    #[default]
    #[serde(rename = "1.1")]
    Soap11,
    #[serde(rename = "1.2")]
    Soap12,
}

impl SoapVersion {
    pub fn envelope_namespace(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => "http://schemas.xmlsoap.org/soap/envelope/",
            SoapVersion::Soap12 => "http://www.w3.org/2003/05/soap-envelope",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => "text/xml",
            SoapVersion::Soap12 => "application/soap+xml",
        }
    }
}

/// Per-call overrides of the client defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallOptions {
    pub location: Option<String>,
    pub soap_action: Option<String>,
    pub uri: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl CallOptions {
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_soap_action(mut self, action: impl Into<String>) -> Self {
        self.soap_action = Some(action.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// A header block sent inside the request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoapHeader {
    pub namespace: String,
    pub name: String,
    pub value: Value,
    #[serde(default)]
    pub must_understand: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

impl SoapHeader {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, value: Value) -> Self {
        SoapHeader {
            namespace: namespace.into(),
            name: name.into(),
            value,
            must_understand: false,
            actor: None,
        }
    }

    pub fn must_understand(mut self) -> Self {
        self.must_understand = true;
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

/// Slot receiving the response header blocks of a call.
///
/// Cloning shares the slot, so a caller can keep one half while the call (or a
/// batch that replays it later) fills the other.
#[derive(Debug, Clone, Default)]
pub struct OutputHeaders {
    inner: Arc<Mutex<Vec<Value>>>,
}

impl OutputHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, headers: Vec<Value>) {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = headers;
    }

    pub fn get(&self) -> Vec<Value> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_empty()
    }
}

/// One remote-method invocation as the caller sees it.
#[derive(Debug, Clone)]
pub struct LogicalCall {
    pub method: String,
    pub args: Vec<Value>,
    pub options: CallOptions,
    pub input_headers: Vec<SoapHeader>,
    pub output_headers: Option<OutputHeaders>,
}

impl LogicalCall {
    pub fn new(method: impl Into<String>, args: Vec<Value>) -> Self {
        LogicalCall {
            method: method.into(),
            args,
            options: CallOptions::default(),
            input_headers: Vec::new(),
            output_headers: None,
        }
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_header(mut self, header: SoapHeader) -> Self {
        self.input_headers.push(header);
        self
    }

    pub fn with_output_headers(mut self, slot: OutputHeaders) -> Self {
        self.output_headers = Some(slot);
        self
    }
}
