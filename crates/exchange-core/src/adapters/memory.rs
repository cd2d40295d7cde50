//! In-memory raw channel.
//!
//! Records everything sent through it and, when paired, delivers each message
//! synchronously to the peer's handler. Used for loopback wiring and tests.

use crate::ports::{AttributeValue, ChannelHandler, RawChannel, TransportError};
use dashmap::DashMap;
use exchange_types::{ChannelId, Message};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::trace;

/// A [`RawChannel`] backed by process memory.
pub struct MemoryChannel {
    id: ChannelId,
    url: Option<String>,
    local_address: Option<SocketAddr>,
    remote_address: Option<SocketAddr>,
    connected: AtomicBool,
    closing: AtomicBool,
    closed: AtomicBool,
    fail_sends: AtomicBool,
    attributes: DashMap<String, AttributeValue>,
    sent: Mutex<Vec<(Message, bool)>>,
    handler: RwLock<Option<Arc<dyn ChannelHandler>>>,
    peer: RwLock<Weak<MemoryChannel>>,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChannel {
    /// A connected channel with a fresh identity.
    pub fn new() -> Self {
        Self {
            id: ChannelId::next(),
            url: None,
            local_address: None,
            remote_address: None,
            connected: AtomicBool::new(true),
            closing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            attributes: DashMap::new(),
            sent: Mutex::new(Vec::new()),
            handler: RwLock::new(None),
            peer: RwLock::new(Weak::new()),
        }
    }

    /// Two channels wired back to back: whatever one sends, the other's
    /// handler receives.
    pub fn pair() -> (Arc<Self>, Arc<Self>) {
        let a = Arc::new(Self::new());
        let b = Arc::new(Self::new());
        *a.peer.write() = Arc::downgrade(&b);
        *b.peer.write() = Arc::downgrade(&a);
        (a, b)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_addresses(mut self, local: SocketAddr, remote: SocketAddr) -> Self {
        self.local_address = Some(local);
        self.remote_address = Some(remote);
        self
    }

    pub fn with_handler(self, handler: Arc<dyn ChannelHandler>) -> Self {
        self.set_handler(handler);
        self
    }

    pub fn set_handler(&self, handler: Arc<dyn ChannelHandler>) {
        *self.handler.write() = Some(handler);
    }

    /// Make every subsequent `send` fail (or succeed again).
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::Release);
    }

    /// Mark the connection as lost without closing the channel.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }

    /// Whether `start_close` was signalled.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Messages sent so far with their `sent` flag.
    pub fn sent_messages(&self) -> Vec<(Message, bool)> {
        self.sent.lock().clone()
    }

    /// Drain the sent log.
    pub fn take_sent(&self) -> Vec<(Message, bool)> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Hand `message` to this channel's handler as if it came off the wire.
    pub fn deliver(self: &Arc<Self>, message: Message) -> Result<(), TransportError> {
        let Some(handler) = self.channel_handler() else {
            trace!(channel = %self.id, kind = message.kind(), "No handler, message dropped");
            return Ok(());
        };
        let raw: Arc<dyn RawChannel> = Arc::clone(self) as Arc<dyn RawChannel>;
        handler.received(&raw, message)
    }
}

impl RawChannel for MemoryChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn send(&self, message: Message, sent: bool) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed { channel: self.id });
        }
        if self.fail_sends.load(Ordering::Acquire) {
            return Err(TransportError::SendFailed {
                channel: self.id,
                reason: "injected failure".into(),
            });
        }

        self.sent.lock().push((message.clone(), sent));

        let peer = self.peer.read().upgrade();
        match peer {
            Some(peer) => peer.deliver(message),
            None => Ok(()),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.connected.store(false, Ordering::Release);
    }

    fn close_with_timeout(&self, _timeout: Duration) {
        self.close();
    }

    fn start_close(&self) {
        self.closing.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn url(&self) -> Option<String> {
        self.url.clone()
    }

    fn local_address(&self) -> Option<SocketAddr> {
        self.local_address
    }

    fn remote_address(&self) -> Option<SocketAddr> {
        self.remote_address
    }

    fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    fn get_attribute(&self, key: &str) -> Option<AttributeValue> {
        self.attributes.get(key).map(|value| Arc::clone(value.value()))
    }

    fn set_attribute(&self, key: &str, value: AttributeValue) {
        self.attributes.insert(key.to_string(), value);
    }

    fn remove_attribute(&self, key: &str) {
        self.attributes.remove(key);
    }

    fn channel_handler(&self) -> Option<Arc<dyn ChannelHandler>> {
        self.handler.read().clone()
    }
}

impl fmt::Debug for MemoryChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryChannel")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .field("closed", &self.is_closed())
            .finish()
    }
}
