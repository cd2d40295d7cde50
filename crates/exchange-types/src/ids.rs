//! Identifiers for requests and raw channels.
//!
//! Both are allocated from process-wide atomic counters, so two values handed
//! out by the same process never collide.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

static NEXT_REQUEST_ID: AtomicI64 = AtomicI64::new(0);
static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier correlating a `Response` with the `Request` that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(i64);

impl RequestId {
    /// Allocate the next request ID for this process.
    pub fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap an ID received from the wire.
    pub const fn from_raw(id: i64) -> Self {
        Self(id)
    }

    /// The raw integer value.
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identity of a raw transport channel.
///
/// Transports assign one per connection with [`ChannelId::next`]; the exchange
/// layer keys its registry and correlation table on it instead of on the
/// channel object itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Allocate a fresh channel identity.
    pub fn next() -> Self {
        Self(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}
