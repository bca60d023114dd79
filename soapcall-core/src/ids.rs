use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of one prepared network operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

/// Identity of one transport connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl RequestId {
    pub fn new(value: u64) -> Self {
        RequestId(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl ConnectionId {
    pub fn new(value: u64) -> Self {
        ConnectionId(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

impl From<u64> for RequestId {
    fn from(value: u64) -> Self {
        RequestId::new(value)
    }
}

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self {
        ConnectionId::new(value)
    }
}

/// Hands out process-unique request ids, starting from 1.
#[derive(Debug)]
pub struct RequestIdAllocator {
    next: AtomicU64,
}

/// Hands out process-unique connection ids, starting from 1.
#[derive(Debug)]
pub struct ConnectionIdAllocator {
    next: AtomicU64,
}

impl RequestIdAllocator {
    pub fn new() -> Self {
        RequestIdAllocator {
            next: AtomicU64::new(1),
        }
    }

    pub fn allocate(&self) -> RequestId {
        RequestId::new(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl ConnectionIdAllocator {
    pub fn new() -> Self {
        ConnectionIdAllocator {
            next: AtomicU64::new(1),
        }
    }

    pub fn allocate(&self) -> ConnectionId {
        ConnectionId::new(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RequestIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ConnectionIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
