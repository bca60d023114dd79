//! Scripted in-process transport for unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use soapcall_core::{ConnectionId, Fault, RequestId, SoapVersion, XmlCodec};
use soapcall_transport::{HttpTransport, PreparedRequest, RawResponse, TransferInfo, TransportError};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Value(Value),
    Fault(Fault),
    Fail(TransportError),
    Raw(u16, &'static str),
}

#[derive(Debug, Clone)]
struct Route {
    delay: Duration,
    reply: Reply,
    headers: Vec<(String, String)>,
}

/// One request as the transport saw it.
#[derive(Debug, Clone)]
pub(crate) struct Sent {
    pub id: RequestId,
    pub connection: ConnectionId,
    pub method: String,
    pub headers: Vec<(String, String)>,
}

impl Sent {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Answers by method name; unrouted methods echo their first argument.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<HashMap<String, Route>>,
    sent: Mutex<Vec<Sent>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, method: &str, delay_ms: u64, reply: Reply) -> Self {
        self.routes.lock().unwrap().insert(
            method.to_string(),
            Route {
                delay: Duration::from_millis(delay_ms),
                reply,
                headers: Vec::new(),
            },
        );
        self
    }

    pub fn with_response_header(self, method: &str, name: &str, value: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_insert_with(|| Route {
                delay: Duration::ZERO,
                reply: Reply::Value(Value::Null),
                headers: Vec::new(),
            })
            .headers
            .push((name.to_string(), value.to_string()));
        self
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        let codec = XmlCodec::new();
        let decoded = codec
            .decode_request(&request.body)
            .map_err(|e| TransportError::Request(e.to_string()))?;
        self.sent.lock().unwrap().push(Sent {
            id: request.id,
            connection: request.connection.id(),
            method: decoded.method.clone(),
            headers: request.headers.clone(),
        });

        let route = self
            .routes
            .lock()
            .unwrap()
            .get(&decoded.method)
            .cloned()
            .unwrap_or_else(|| Route {
                delay: Duration::ZERO,
                reply: Reply::Value(decoded.args.first().cloned().unwrap_or(Value::Null)),
                headers: Vec::new(),
            });
        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }

        let namespace = decoded.namespace.unwrap_or_default();
        let (status, reason, body) = match route.reply {
            Reply::Value(value) => (
                200,
                "OK",
                codec.encode_response(&decoded.method, &namespace, &value, SoapVersion::Soap11),
            ),
            Reply::Fault(fault) => (
                500,
                "Internal Server Error",
                codec.encode_fault(&fault, SoapVersion::Soap11),
            ),
            Reply::Fail(err) => return Err(err),
            Reply::Raw(status, body) => (status, "Scripted", Bytes::from_static(body.as_bytes())),
        };

        let mut headers = vec![("Content-Type".to_string(), "text/xml; charset=utf-8".to_string())];
        headers.extend(route.headers);
        Ok(RawResponse {
            status: Some(status),
            reason: Some(reason.to_string()),
            headers,
            info: TransferInfo {
                url: request.url.clone(),
                status: Some(status),
                total_time: route.delay,
                connection: Some(request.connection.id()),
                bytes_received: body.len(),
            },
            body,
        })
    }
}
