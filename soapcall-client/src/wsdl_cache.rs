//! On-disk cache of fetched service descriptions.
//!
//! Entries are keyed by `prefix + hex(sha256(source))` and are fresh while their
//! modification time is within the TTL. Writers hold a `<key>.lock` file created
//! with `create_new`, write to a uniquely named temp file and rename it over the
//! entry, so concurrent readers never see a partial document.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use soapcall_core::SoapError;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, trace};

/// Lock files older than this are left over from a crashed writer.
const STALE_LOCK_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WsdlCacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub prefix: String,
    pub ttl_secs: u64,
}

impl Default for WsdlCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: std::env::temp_dir(),
            prefix: "wsdl-".to_string(),
            ttl_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WsdlCache {
    dir: PathBuf,
    prefix: String,
    ttl: Duration,
}

impl WsdlCache {
    pub fn new(config: &WsdlCacheConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            prefix: config.prefix.clone(),
            ttl: Duration::from_secs(config.ttl_secs),
        }
    }

    pub fn key(&self, source: &str) -> String {
        format!("{}{:x}", self.prefix, Sha256::digest(source.as_bytes()))
    }

    pub fn path_for(&self, source: &str) -> PathBuf {
        self.dir.join(self.key(source))
    }

    fn lock_path(&self, source: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", self.key(source)))
    }

    /// Cached bytes for `source`, if present and fresh.
    pub fn load(&self, source: &str) -> Option<Bytes> {
        let path = self.path_for(source);
        let modified = fs::metadata(&path).and_then(|meta| meta.modified()).ok()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age > self.ttl {
            trace!(path = %path.display(), age_secs = age.as_secs(), "cached WSDL expired");
            return None;
        }
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(path = %path.display(), "WSDL cache hit");
                Some(Bytes::from(bytes))
            }
            Err(e) => {
                trace!(path = %path.display(), error = %e, "cached WSDL unreadable");
                None
            }
        }
    }

    pub fn store(&self, source: &str, document: &[u8]) -> Result<(), SoapError> {
        fs::create_dir_all(&self.dir).map_err(|e| cache_io(&self.dir, e))?;
        let path = self.path_for(source);
        let _lock = LockFile::acquire(self.lock_path(source))?;

        let temp = self
            .dir
            .join(format!(".{}.{}.tmp", self.key(source), uuid::Uuid::new_v4()));
        let written = write_file(&temp, document).and_then(|()| fs::rename(&temp, &path));
        if let Err(e) = written {
            let _ = fs::remove_file(&temp);
            return Err(cache_io(&path, e));
        }
        debug!(path = %path.display(), bytes = document.len(), "stored WSDL in cache");
        Ok(())
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn cache_io(path: &Path, err: std::io::Error) -> SoapError {
    SoapError::CacheIo(format!("{}: {}", path.display(), err))
}

/// Exclusive writer lock, released on drop.
#[derive(Debug)]
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    fn acquire(path: PathBuf) -> Result<Self, SoapError> {
        match Self::create(&path) {
            Err(e) if e.kind() == ErrorKind::AlreadyExists && Self::is_stale(&path) => {
                debug!(path = %path.display(), "removing stale cache lock");
                let _ = fs::remove_file(&path);
                Self::create(&path).map_err(|e| cache_io(&path, e))?;
            }
            Err(e) => return Err(cache_io(&path, e)),
            Ok(()) => {}
        }
        Ok(Self { path })
    }

    fn create(path: &Path) -> std::io::Result<()> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map(drop)
    }

    fn is_stale(path: &Path) -> bool {
        fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > STALE_LOCK_AFTER)
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_in(dir: &Path, ttl_secs: u64) -> WsdlCache {
        WsdlCache::new(&WsdlCacheConfig {
            enabled: true,
            dir: dir.to_path_buf(),
            prefix: "wsdl-".to_string(),
            ttl_secs,
        })
    }

    #[test]
    fn test_key_is_prefixed_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), 60);
        let key = cache.key("http://svc.test/service?wsdl");
        assert!(key.starts_with("wsdl-"));
        assert_eq!(key.len(), "wsdl-".len() + 64);
        assert_ne!(key, cache.key("http://svc.test/other?wsdl"));
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), 60);
        assert!(cache.load("src").is_none());

        cache.store("src", b"<definitions/>").unwrap();
        assert_eq!(cache.load("src").unwrap(), Bytes::from_static(b"<definitions/>"));
        assert!(!cache.lock_path("src").exists());

        // only the entry itself is left behind
        let names: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_zero_ttl_expires_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), 0);
        cache.store("src", b"<definitions/>").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.load("src").is_none());
    }

    #[test]
    fn test_held_lock_fails_store() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), 60);
        let _held = LockFile::acquire(cache.lock_path("src")).unwrap();

        let err = cache.store("src", b"<definitions/>").unwrap_err();
        assert!(matches!(err, SoapError::CacheIo(_)));
        assert!(cache.load("src").is_none());
    }

    #[test]
    fn test_unwritable_dir_is_cache_io() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"x").unwrap();
        let cache = cache_in(&blocker, 60);
        assert!(matches!(
            cache.store("src", b"<definitions/>"),
            Err(SoapError::CacheIo(_))
        ));
    }

    #[test]
    fn test_dotted_prefix_keeps_locks_per_source() {
        let dir = tempfile::tempdir().unwrap();
        let cache = WsdlCache::new(&WsdlCacheConfig {
            enabled: true,
            dir: dir.path().to_path_buf(),
            prefix: "cache.v1-".to_string(),
            ttl_secs: 60,
        });
        assert_ne!(cache.lock_path("a"), cache.lock_path("b"));

        let _held = LockFile::acquire(cache.lock_path("a")).unwrap();
        cache.store("b", b"<definitions/>").unwrap();
        assert!(cache.load("b").is_some());
    }
}
