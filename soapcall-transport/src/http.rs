use crate::request::{HttpMethod, PreparedRequest};
use crate::transport::{HttpTransport, RawResponse, TransferInfo, TransportError};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, trace};

/// Headers the HTTP stack derives itself from the URL and body.
const STACK_MANAGED: [&str; 2] = ["host", "content-length"];

/// [`HttpTransport`] over the request's own `reqwest` connection handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    pub fn new() -> Self {
        ReqwestTransport
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        let started = Instant::now();
        let http = request.connection.http();

        let mut builder = match request.method {
            HttpMethod::Get => http.get(&request.url),
            HttpMethod::Post => http.post(&request.url),
        };
        for (name, value) in &request.headers {
            if STACK_MANAGED.iter().any(|managed| name.eq_ignore_ascii_case(managed)) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if request.method == HttpMethod::Post {
            builder = builder.body(request.body.clone());
        }

        debug!(
            request = %request.id,
            connection = %request.connection.id(),
            url = %request.url,
            timeout_ms = request.timeout.as_millis() as u64,
            "sending request"
        );

        let response = builder.timeout(request.timeout).send().await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?;
        let total_time = started.elapsed();

        trace!(
            request = %request.id,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = total_time.as_millis() as u64,
            "response received"
        );

        Ok(RawResponse {
            status: Some(status.as_u16()),
            reason: status.canonical_reason().map(str::to_string),
            headers,
            info: TransferInfo {
                url: request.url.clone(),
                status: Some(status.as_u16()),
                total_time,
                connection: Some(request.connection.id()),
                bytes_received: body.len(),
            },
            body,
        })
    }
}
