//! Outbound Ports (Driven Ports)
//!
//! The exchange layer consumes a raw, bidirectional message channel supplied
//! by the transport. Socket I/O, framing and encoding all live behind these
//! traits.

use exchange_types::{ChannelId, Message};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Value stored in a channel's attribute bag.
pub type AttributeValue = Arc<dyn Any + Send + Sync>;

/// Errors reported by the raw transport.
///
/// Surfaced to callers of the exchange layer unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("channel {channel} is closed")]
    Closed { channel: ChannelId },

    #[error("send failed on {channel}: {reason}")]
    SendFailed { channel: ChannelId, reason: String },

    #[error("transport error: {0}")]
    Other(String),
}

/// A raw transport channel.
///
/// `id()` is the channel identity: stable for the channel's lifetime and never
/// shared with another live channel.
pub trait RawChannel: Send + Sync {
    fn id(&self) -> ChannelId;

    /// Hand a message to the transport. With `sent = true` the call waits for
    /// the transport to flush the message; otherwise it returns once queued.
    fn send(&self, message: Message, sent: bool) -> Result<(), TransportError>;

    /// Force the connection down.
    fn close(&self);

    /// Close, giving the transport up to `timeout` to flush.
    fn close_with_timeout(&self, timeout: Duration);

    /// Signal the peer that this side is going away without closing the
    /// connection.
    fn start_close(&self);

    fn is_closed(&self) -> bool;

    fn is_connected(&self) -> bool;

    fn url(&self) -> Option<String>;

    fn local_address(&self) -> Option<SocketAddr>;

    fn remote_address(&self) -> Option<SocketAddr>;

    fn has_attribute(&self, key: &str) -> bool;

    fn get_attribute(&self, key: &str) -> Option<AttributeValue>;

    fn set_attribute(&self, key: &str, value: AttributeValue);

    fn remove_attribute(&self, key: &str);

    /// Handler the transport invokes for this channel's events.
    fn channel_handler(&self) -> Option<Arc<dyn ChannelHandler>>;
}

/// Sink for transport events on a raw channel.
///
/// Invoked by the transport's I/O threads.
pub trait ChannelHandler: Send + Sync {
    fn connected(&self, channel: &Arc<dyn RawChannel>) -> Result<(), TransportError>;

    fn disconnected(&self, channel: &Arc<dyn RawChannel>) -> Result<(), TransportError>;

    fn sent(&self, channel: &Arc<dyn RawChannel>, message: &Message) -> Result<(), TransportError>;

    fn received(&self, channel: &Arc<dyn RawChannel>, message: Message)
        -> Result<(), TransportError>;

    fn caught(
        &self,
        channel: &Arc<dyn RawChannel>,
        error: &TransportError,
    ) -> Result<(), TransportError>;
}
