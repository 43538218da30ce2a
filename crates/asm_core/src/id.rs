//! Hydration id generation
//!
//! Ids are scoped to one render pass: a fresh [`HydrationIdGenerator`] is
//! created per request, so ids are small and deterministic for a given tree.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Unique id of one render node within a page render
///
/// Serialized in its display form (`"h2"`), the same text the marker's id
/// attribute carries.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct HydrationId(u64);

impl HydrationId {
    /// Create an id from its raw index
    #[inline]
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Raw index
    #[inline]
    pub const fn index(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for HydrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HydrationId(h{})", self.0)
    }
}

impl fmt::Display for HydrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

impl FromStr for HydrationId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('h')
            .and_then(|n| n.parse::<u64>().ok())
            .map(Self)
            .ok_or_else(|| CoreError::InvalidHydrationId(s.into()))
    }
}

impl From<HydrationId> for String {
    fn from(id: HydrationId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for HydrationId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Thread-safe monotonic id generator
pub struct HydrationIdGenerator {
    next: AtomicU64,
}

impl HydrationIdGenerator {
    /// Create a new generator starting at `h0`
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Generate the next unique id
    pub fn next(&self) -> HydrationId {
        HydrationId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of ids handed out so far
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for HydrationIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HydrationIdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HydrationIdGenerator")
            .field("issued", &self.issued())
            .finish()
    }
}
