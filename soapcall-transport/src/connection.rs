//! Connection handles and the per-client cache keyed by `host:port`.

use crate::transport::TransportError;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use soapcall_core::{ConnectionId, ConnectionIdAllocator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// TLS settings applied when a connection handle is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsOptions {
    /// Verify the server certificate chain and host name.
    pub verify_peer: bool,
    /// Extra PEM bundle of trusted roots.
    pub ca_file: Option<PathBuf>,
    /// PEM file holding the client certificate and its private key.
    pub identity_file: Option<PathBuf>,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            verify_peer: true,
            ca_file: None,
            identity_file: None,
        }
    }
}

/// Settings a connection is built with; a cached handle whose settings differ
/// from the requested ones is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub tls: TlsOptions,
    pub keep_alive: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            tls: TlsOptions::default(),
            keep_alive: true,
        }
    }
}

/// A reusable transport handle bound to one `host:port`.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    host: String,
    port: u16,
    settings: ConnectionSettings,
    http: reqwest::Client,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn is_usable_for(&self, settings: &ConnectionSettings) -> bool {
        self.settings == *settings
    }
}

/// PEM files read once per path and shared by every handle built from them.
#[derive(Debug, Default)]
struct PemStore {
    files: DashMap<PathBuf, Arc<[u8]>>,
}

impl PemStore {
    fn load(&self, path: &Path, what: &str) -> Result<Arc<[u8]>, TransportError> {
        if let Some(pem) = self.files.get(path) {
            return Ok(Arc::clone(pem.value()));
        }
        let pem: Arc<[u8]> = std::fs::read(path)
            .map_err(|e| TransportError::Tls(format!("cannot read {} {}: {}", what, path.display(), e)))?
            .into();
        debug!(path = %path.display(), what, "loaded PEM file");
        self.files.insert(path.to_path_buf(), Arc::clone(&pem));
        Ok(pem)
    }

    fn clear(&self) {
        self.files.clear();
    }
}

fn build_http_client(
    settings: &ConnectionSettings,
    pem: &PemStore,
) -> Result<reqwest::Client, TransportError> {
    let tls = &settings.tls;
    let mut builder = reqwest::Client::builder().danger_accept_invalid_certs(!tls.verify_peer);

    if !settings.keep_alive {
        builder = builder.pool_max_idle_per_host(0);
    }

    if let Some(ca_file) = &tls.ca_file {
        let pem = pem.load(ca_file, "CA file")?;
        let certificate = reqwest::Certificate::from_pem(&pem)
            .map_err(|e| TransportError::Tls(format!("invalid CA certificate: {}", e)))?;
        builder = builder.add_root_certificate(certificate);
    }

    if let Some(identity_file) = &tls.identity_file {
        let pem = pem.load(identity_file, "client identity")?;
        let identity = reqwest::Identity::from_pem(&pem)
            .map_err(|e| TransportError::Tls(format!("invalid client identity: {}", e)))?;
        builder = builder.identity(identity);
    }

    builder
        .build()
        .map_err(|e| TransportError::Tls(format!("failed to build HTTP client: {}", e)))
}

/// Maps `(host, port)` to the handle last used for it.
///
/// Synchronous calls reuse the cached handle while it is usable. While a batch
/// is capturing, every acquisition allocates a fresh handle so that no two
/// in-flight requests share one.
#[derive(Debug, Default)]
pub struct ConnectionCache {
    entries: DashMap<(String, u16), Arc<Connection>>,
    pem: PemStore,
    ids: ConnectionIdAllocator,
}

impl ConnectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(
        &self,
        host: &str,
        port: u16,
        async_active: bool,
        settings: &ConnectionSettings,
    ) -> Result<Arc<Connection>, TransportError> {
        let key = (host.to_ascii_lowercase(), port);

        if !async_active {
            if let Some(cached) = self.entries.get(&key) {
                if cached.is_usable_for(settings) {
                    return Ok(Arc::clone(cached.value()));
                }
                debug!(host, port, connection = %cached.id(), "cached connection is stale, replacing");
            }
        }

        let connection = Arc::new(Connection {
            id: self.ids.allocate(),
            host: key.0.clone(),
            port,
            settings: settings.clone(),
            http: build_http_client(settings, &self.pem)?,
        });
        debug!(host, port, connection = %connection.id(), async_active, "allocated connection");
        self.entries.insert(key, Arc::clone(&connection));
        Ok(connection)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every handle and forget loaded PEM files, so the next acquisition
    /// reads certificates from disk again.
    pub fn clear(&self) {
        self.entries.clear();
        self.pem.clear();
    }
}
