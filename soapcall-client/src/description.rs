//! Loading a service description from a URL or a local file, through the cache.

use crate::config::ClientConfig;
use crate::wsdl_cache::WsdlCache;
use bytes::Bytes;
use soapcall_core::{ServiceDescription, SoapError};
use soapcall_transport::{
    ConnectionSettings, HttpTransport, RawResponse, RequestBuilder, RequestOptions,
};
use tracing::{debug, info, warn};

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn load_error(source: &str, reason: impl std::fmt::Display) -> SoapError {
    SoapError::Wsdl(format!("Couldn't load from '{}': {}", source, reason))
}

async fn fetch(
    source: &str,
    config: &ClientConfig,
    requests: &RequestBuilder,
    transport: &dyn HttpTransport,
) -> Result<Bytes, SoapError> {
    if !is_remote(source) {
        let path = source.strip_prefix("file://").unwrap_or(source);
        let payload = tokio::fs::read(path)
            .await
            .map_err(|e| load_error(source, e))?;
        return Ok(RawResponse::from_payload(payload).body);
    }

    let options = RequestOptions {
        timeout: config.request_timeout(None),
        user_agent: Some(config.user_agent.clone()),
        basic_auth: config.basic_auth(),
        connection: ConnectionSettings {
            tls: config.tls.clone(),
            keep_alive: config.keep_alive,
        },
        ..Default::default()
    };
    let request = requests
        .prepare_get(source, &options)
        .map_err(|e| load_error(source, e))?;
    let response = transport
        .execute(&request)
        .await
        .map_err(|e| load_error(source, e))?;
    match response.status {
        Some(status) if status >= 400 => Err(load_error(source, format!("HTTP status {}", status))),
        _ => Ok(response.body),
    }
}

async fn cached(cache: &WsdlCache, source: &str) -> Option<Bytes> {
    let (cache, source) = (cache.clone(), source.to_string());
    tokio::task::spawn_blocking(move || cache.load(&source))
        .await
        .ok()
        .flatten()
}

async fn store(cache: WsdlCache, source: &str, document: Bytes) -> Result<(), SoapError> {
    let source = source.to_string();
    tokio::task::spawn_blocking(move || cache.store(&source, &document))
        .await
        .map_err(|e| SoapError::CacheIo(format!("cache writer failed: {}", e)))?
}

/// Parse the description at `source`, serving and refreshing the on-disk cache.
///
/// A document is only cached once it parses; failing to write the cache is
/// logged and otherwise ignored.
pub(crate) async fn load(
    source: &str,
    config: &ClientConfig,
    requests: &RequestBuilder,
    transport: &dyn HttpTransport,
) -> Result<ServiceDescription, SoapError> {
    let cache = config
        .wsdl_cache
        .enabled
        .then(|| WsdlCache::new(&config.wsdl_cache));

    if let Some(cache) = &cache {
        if let Some(document) = cached(cache, source).await {
            match ServiceDescription::parse(&document) {
                Ok(service) => return Ok(service),
                Err(e) => debug!(source, error = %e, "ignoring unparsable cached WSDL"),
            }
        }
    }

    let document = fetch(source, config, requests, transport).await?;
    let service = ServiceDescription::parse(&document)?;
    if let Some(cache) = cache {
        if let Err(e) = store(cache, source, document).await {
            warn!(source, error = %e, "could not cache WSDL; continuing without it");
        }
    }

    info!(
        source,
        endpoints = service.endpoints.len(),
        operations = service.operations.len(),
        "loaded service description"
    );
    Ok(service)
}
