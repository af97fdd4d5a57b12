//! Identifiers for managed sessions and the users that own them.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Key of a session in the registry.
///
/// The textual form `inst-XXXXXXXX` is baked into every control a session
/// renders, so an interaction arriving later can be routed back to its
/// session without any other lookup table. Values come from a process-wide
/// counter and are never reused while the process runs; an id parsed from a
/// stale control simply finds nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new() -> Self {
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Rebuild an id from its numeric part, e.g. one decoded elsewhere.
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inst-{:08x}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = crate::error::InstanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("inst-")
            .filter(|hex| !hex.is_empty())
            .and_then(|hex| u64::from_str_radix(hex, 16).ok())
            .map(SessionId)
            .ok_or_else(|| crate::error::InstanceError::InvalidId(s.into()))
    }
}

/// Identity of the user allowed to acquire a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(u64);

impl OwnerId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for OwnerId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.0)
    }
}
