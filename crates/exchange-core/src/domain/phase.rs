//! Channel lifecycle phase.
//!
//! ```text
//! OPEN ──start_close──> CLOSING ──close──> CLOSED
//!   └───────────────────close─────────────────^
//! ```
//!
//! Transitions only move forward; CLOSED is terminal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle phase of an exchange channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelPhase {
    /// Accepting sends and requests
    Open,
    /// Rejecting new work, waiting for outstanding requests
    Closing,
    /// Terminal
    Closed,
}

impl ChannelPhase {
    pub fn is_open(&self) -> bool {
        matches!(self, ChannelPhase::Open)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ChannelPhase::Open,
            1 => ChannelPhase::Closing,
            _ => ChannelPhase::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ChannelPhase::Open => 0,
            ChannelPhase::Closing => 1,
            ChannelPhase::Closed => 2,
        }
    }
}

impl fmt::Display for ChannelPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelPhase::Open => write!(f, "open"),
            ChannelPhase::Closing => write!(f, "closing"),
            ChannelPhase::Closed => write!(f, "closed"),
        }
    }
}

/// Atomic holder of a [`ChannelPhase`].
#[derive(Debug)]
pub(crate) struct PhaseCell(AtomicU8);

impl PhaseCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ChannelPhase::Open.as_u8()))
    }

    pub(crate) fn load(&self) -> ChannelPhase {
        ChannelPhase::from_u8(self.0.load(Ordering::Acquire))
    }

    /// OPEN -> CLOSING. Returns false if the channel was not open.
    pub(crate) fn begin_closing(&self) -> bool {
        self.0
            .compare_exchange(
                ChannelPhase::Open.as_u8(),
                ChannelPhase::Closing.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to CLOSED from any phase, returning the previous one.
    pub(crate) fn finish(&self) -> ChannelPhase {
        ChannelPhase::from_u8(self.0.swap(ChannelPhase::Closed.as_u8(), Ordering::AcqRel))
    }
}
