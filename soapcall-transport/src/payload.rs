//! Splitting a raw transport payload into header block and body.

use crate::transport::{RawResponse, TransferInfo};
use bytes::Bytes;

/// First blank line, whichever of CRLF or bare LF framing it uses.
fn find_boundary(payload: &[u8]) -> Option<(usize, usize)> {
    let crlf = payload
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| (pos, pos + 4));
    let lf = payload
        .windows(2)
        .position(|w| w == b"\n\n")
        .map(|pos| (pos, pos + 2));
    match (crlf, lf) {
        (Some(crlf), Some(lf)) => Some(if lf.0 < crlf.0 { lf } else { crlf }),
        (crlf, lf) => crlf.or(lf),
    }
}

fn parse_status_line(line: &str) -> (Option<u16>, Option<String>) {
    let mut parts = line.splitn(3, ' ');
    let _version = parts.next();
    let status = parts.next().and_then(|code| code.trim().parse::<u16>().ok());
    let reason = parts
        .next()
        .map(|reason| reason.trim().to_string())
        .filter(|reason| !reason.is_empty());
    (status, reason)
}

impl RawResponse {
    /// Build a response from bytes that may or may not carry HTTP framing.
    ///
    /// HTTP-framed payloads are split at the first blank line; a provisional
    /// `1xx` block in front of the real response is skipped. Anything else (a
    /// document read from disk, for example) is returned as body with no headers.
    pub fn from_payload(payload: impl Into<Bytes>) -> RawResponse {
        let mut payload: Bytes = payload.into();

        loop {
            if !payload.starts_with(b"HTTP/") {
                return RawResponse {
                    body: payload.clone(),
                    info: TransferInfo {
                        bytes_received: payload.len(),
                        ..Default::default()
                    },
                    ..Default::default()
                };
            }

            let Some((end, body_start)) = find_boundary(&payload) else {
                // headers with no body at all
                return Self::from_header_block(&String::from_utf8_lossy(&payload), Bytes::new());
            };

            let block = String::from_utf8_lossy(&payload[..end]).into_owned();
            let rest = payload.slice(body_start..);
            let (status, _) = parse_status_line(block.lines().next().unwrap_or_default());

            if matches!(status, Some(100..=199)) && rest.starts_with(b"HTTP/") {
                payload = rest;
                continue;
            }
            return Self::from_header_block(&block, rest);
        }
    }

    fn from_header_block(block: &str, body: Bytes) -> RawResponse {
        let mut lines = block.lines();
        let (status, reason) = parse_status_line(lines.next().unwrap_or_default());
        let headers = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .collect();
        RawResponse {
            status,
            reason,
            headers,
            info: TransferInfo {
                status,
                bytes_received: body.len(),
                ..Default::default()
            },
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_http_payload() {
        let raw = "HTTP/1.1 200 OK\r\nContent-Type: text/xml\r\nSet-Cookie: sid=1; Path=/\r\n\r\n<xml/>";
        let response = RawResponse::from_payload(raw);
        assert_eq!(response.status, Some(200));
        assert_eq!(response.reason.as_deref(), Some("OK"));
        assert_eq!(response.header("content-type"), Some("text/xml"));
        assert_eq!(response.header("set-cookie"), Some("sid=1; Path=/"));
        assert_eq!(&response.body[..], b"<xml/>");
    }

    #[test]
    fn test_provisional_continue_is_skipped() {
        let raw = "HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 500 Internal Server Error\r\nX-A: b\r\n\r\nfault";
        let response = RawResponse::from_payload(raw);
        assert_eq!(response.status, Some(500));
        assert_eq!(response.reason.as_deref(), Some("Internal Server Error"));
        assert_eq!(response.header("x-a"), Some("b"));
        assert_eq!(&response.body[..], b"fault");
    }

    #[test]
    fn test_body_containing_blank_lines_is_preserved() {
        let raw = "HTTP/1.0 200 OK\n\nline one\n\nline two";
        let response = RawResponse::from_payload(raw);
        assert_eq!(&response.body[..], b"line one\n\nline two");
    }

    #[test]
    fn test_lf_framing_with_crlf_in_body() {
        let raw = "HTTP/1.1 200 OK\nX-A: b\n\n<a>\r\n\r\n</a>";
        let response = RawResponse::from_payload(raw);
        assert_eq!(response.status, Some(200));
        assert_eq!(response.header("x-a"), Some("b"));
        assert_eq!(&response.body[..], b"<a>\r\n\r\n</a>");
    }

    #[test]
    fn test_unframed_payload_passes_through() {
        let response = RawResponse::from_payload("<definitions/>");
        assert_eq!(response.status, None);
        assert!(response.headers.is_empty());
        assert_eq!(&response.body[..], b"<definitions/>");
    }

    #[test]
    fn test_headers_only() {
        let response = RawResponse::from_payload("HTTP/1.1 204 No Content\r\nX-Id: 9");
        assert_eq!(response.status, Some(204));
        assert_eq!(response.header("x-id"), Some("9"));
        assert!(response.body.is_empty());
    }
}
