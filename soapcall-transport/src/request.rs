//! Request preparation: header assembly and connection binding, no I/O.

use crate::connection::{Connection, ConnectionCache, ConnectionSettings};
use crate::transport::TransportError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use soapcall_core::{RequestId, RequestIdAllocator, SoapVersion};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully configured network operation that has not been started.
#[derive(Debug)]
pub struct PreparedRequest {
    pub id: RequestId,
    pub method: HttpMethod,
    pub url: String,
    /// Request target as sent on the status line (path and query).
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub timeout: Duration,
    pub connection: Arc<Connection>,
}

impl PreparedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Request line plus header lines, as they would appear on the wire.
    pub fn header_block(&self) -> String {
        let mut block = format!("{} {} HTTP/1.1\r\n", self.method, self.target);
        for (key, value) in &self.headers {
            block.push_str(&format!("{}: {}\r\n", key, value));
        }
        block
    }
}

/// Everything besides body and destination that shapes a request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub basic_auth: Option<(String, String)>,
    /// Caller supplied headers; a name already produced here replaces the built one.
    pub custom_headers: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub connection: ConnectionSettings,
    /// A batch is capturing; forces a fresh connection handle.
    pub async_active: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            user_agent: None,
            basic_auth: None,
            custom_headers: Vec::new(),
            cookies: Vec::new(),
            connection: ConnectionSettings::default(),
            async_active: false,
        }
    }
}

struct Destination {
    host: String,
    port: u16,
    host_header: String,
    target: String,
}

fn destination(url: &str) -> Result<Destination, TransportError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(TransportError::InvalidUrl(format!(
                "unsupported scheme '{}' in {}",
                other, url
            )))
        }
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| TransportError::InvalidUrl(format!("no host in {}", url)))?
        .to_string();
    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| TransportError::InvalidUrl(format!("no port for {}", url)))?;
    let host_header = match parsed.port() {
        Some(explicit) => format!("{}:{}", host, explicit),
        None => host.clone(),
    };
    let mut target = parsed.path().to_string();
    if let Some(query) = parsed.query() {
        target.push('?');
        target.push_str(query);
    }
    Ok(Destination {
        host,
        port,
        host_header,
        target,
    })
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    match headers
        .iter_mut()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
    {
        Some(existing) => existing.1 = value,
        None => headers.push((name.to_string(), value)),
    }
}

/// Builds [`PreparedRequest`]s against a shared [`ConnectionCache`].
#[derive(Debug)]
pub struct RequestBuilder {
    connections: Arc<ConnectionCache>,
    ids: RequestIdAllocator,
}

impl RequestBuilder {
    pub fn new(connections: Arc<ConnectionCache>) -> Self {
        Self {
            connections,
            ids: RequestIdAllocator::new(),
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionCache> {
        &self.connections
    }

    /// Prepare a SOAP POST of `body` to `url`.
    pub fn prepare(
        &self,
        body: Bytes,
        url: &str,
        action: &str,
        version: SoapVersion,
        options: &RequestOptions,
    ) -> Result<PreparedRequest, TransportError> {
        let (content_type, soap_action) = match version {
            SoapVersion::Soap11 => (
                format!("{}; charset=utf-8", version.media_type()),
                Some(format!("\"{}\"", action)),
            ),
            SoapVersion::Soap12 => (
                format!("{}; charset=utf-8; action=\"{}\"", version.media_type(), action),
                None,
            ),
        };

        let mut protocol_headers = vec![("Content-Type".to_string(), content_type)];
        if let Some(soap_action) = soap_action {
            protocol_headers.push(("SOAPAction".to_string(), soap_action));
        }
        protocol_headers.push(("Content-Length".to_string(), body.len().to_string()));

        self.build(HttpMethod::Post, url, protocol_headers, body, options)
    }

    /// Prepare a plain GET, used for fetching service descriptions.
    pub fn prepare_get(&self, url: &str, options: &RequestOptions) -> Result<PreparedRequest, TransportError> {
        self.build(HttpMethod::Get, url, Vec::new(), Bytes::new(), options)
    }

    fn build(
        &self,
        method: HttpMethod,
        url: &str,
        protocol_headers: Vec<(String, String)>,
        body: Bytes,
        options: &RequestOptions,
    ) -> Result<PreparedRequest, TransportError> {
        let dest = destination(url)?;
        let connection = self.connections.acquire(
            &dest.host,
            dest.port,
            options.async_active,
            &options.connection,
        )?;

        let mut headers = vec![
            ("Host".to_string(), dest.host_header),
            (
                "Connection".to_string(),
                if options.connection.keep_alive {
                    "Keep-Alive".to_string()
                } else {
                    "close".to_string()
                },
            ),
        ];
        if let Some(agent) = &options.user_agent {
            headers.push(("User-Agent".to_string(), agent.clone()));
        }
        headers.extend(protocol_headers);
        if let Some((login, password)) = &options.basic_auth {
            let token = BASE64.encode(format!("{}:{}", login, password));
            headers.push(("Authorization".to_string(), format!("Basic {}", token)));
        }
        for (name, value) in &options.custom_headers {
            set_header(&mut headers, name, value.clone());
        }
        if !options.cookies.is_empty() {
            let cookie = options
                .cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            set_header(&mut headers, "Cookie", cookie);
        }

        let request = PreparedRequest {
            id: self.ids.allocate(),
            method,
            url: url.to_string(),
            target: dest.target,
            headers,
            body,
            timeout: options.timeout,
            connection,
        };
        trace!(
            request = %request.id,
            connection = %request.connection.id(),
            method = %request.method,
            url = %request.url,
            "prepared request"
        );
        Ok(request)
    }
}
