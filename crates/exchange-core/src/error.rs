//! Error types for the exchange layer

use crate::ports::TransportError;
use exchange_types::{ChannelId, RequestId, Status};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by exchange channels and invocation handles.
///
/// `Clone` because one terminal outcome can be observed by several waiters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// `send`/`request` on a channel that is closing or closed.
    #[error("Failed to send {kind} on {channel}: the channel is closed")]
    ChannelClosed {
        channel: ChannelId,
        kind: &'static str,
    },

    /// No response arrived before the invocation's deadline.
    #[error("Waiting for response to request {request_id} on {channel} timed out after {elapsed:?} (timeout {timeout:?})")]
    Timeout {
        request_id: RequestId,
        channel: ChannelId,
        elapsed: Duration,
        timeout: Duration,
    },

    /// The owning channel closed or disconnected while the request was pending.
    #[error("Channel {channel} is inactive, request {request_id} abandoned: {cause}")]
    ChannelInactive {
        request_id: RequestId,
        channel: ChannelId,
        cause: String,
    },

    /// A request ID was registered twice. Never retryable.
    #[error("Request id {0} is already pending")]
    DuplicateRequestId(RequestId),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ExchangeError {
    /// Response status equivalent of this error.
    pub fn status(&self) -> Status {
        match self {
            ExchangeError::Timeout { .. } => Status::ClientTimeout,
            ExchangeError::ChannelInactive { .. } => Status::ChannelInactive,
            ExchangeError::ChannelClosed { .. }
            | ExchangeError::DuplicateRequestId(_)
            | ExchangeError::Transport(_) => Status::ClientError,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ExchangeError::Timeout { .. })
    }

    pub fn is_channel_closed(&self) -> bool {
        matches!(self, ExchangeError::ChannelClosed { .. })
    }

    pub fn is_channel_inactive(&self) -> bool {
        matches!(self, ExchangeError::ChannelInactive { .. })
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),
}
