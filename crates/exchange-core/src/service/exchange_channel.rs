//! # Exchange Channel
//!
//! Wraps a raw transport channel with request/response semantics.
//!
//! ## Lifecycle
//!
//! ```text
//! OPEN ──start_close──> CLOSING ──close──> CLOSED
//! ```
//!
//! - OPEN: `send` and `request` are accepted.
//! - CLOSING: new work is rejected with `ChannelClosed`; outstanding requests
//!   may still complete.
//! - CLOSED: terminal. Pending invocations owned by the channel have been
//!   failed with `ChannelInactive` and the raw channel is closed.

use crate::domain::phase::PhaseCell;
use crate::domain::{ChannelPhase, ExchangeConfig, InflightCounter, PendingTable, ResponseFuture};
use crate::error::ExchangeError;
use crate::ports::{AttributeValue, ChannelHandler, RawChannel};
use crate::service::registry::ChannelRegistry;
use bytes::Bytes;
use exchange_telemetry::REQUESTS_SENT;
use exchange_types::{ChannelId, Message, Request};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, warn};

/// Wrapper instance numbers; 0 is left to invocations registered outside a
/// wrapper.
static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Request/response channel over a [`RawChannel`].
pub struct ExchangeChannel {
    id: ChannelId,
    /// Distinguishes successive wrappers of the same raw channel
    instance: u64,
    raw: Arc<dyn RawChannel>,
    phase: PhaseCell,
    /// Two-way requests sent on this channel and not yet resolved
    inflight: Arc<InflightCounter>,
    pending: Arc<PendingTable>,
    /// Registry to leave on close, if the channel was obtained from one
    registry: Weak<ChannelRegistry>,
    config: ExchangeConfig,
}

impl ExchangeChannel {
    /// Wrap `raw` using the process-wide pending table and default config.
    pub fn new(raw: Arc<dyn RawChannel>) -> Self {
        Self::with_table(raw, PendingTable::global(), ExchangeConfig::default())
    }

    /// Wrap `raw` with an explicit pending table and config.
    pub fn with_table(
        raw: Arc<dyn RawChannel>,
        pending: Arc<PendingTable>,
        config: ExchangeConfig,
    ) -> Self {
        Self::registered(raw, pending, config, Weak::new())
    }

    pub(crate) fn registered(
        raw: Arc<dyn RawChannel>,
        pending: Arc<PendingTable>,
        config: ExchangeConfig,
        registry: Weak<ChannelRegistry>,
    ) -> Self {
        Self {
            id: raw.id(),
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            raw,
            phase: PhaseCell::new(),
            inflight: Arc::new(InflightCounter::new()),
            pending,
            registry,
            config,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> ChannelPhase {
        self.phase.load()
    }

    /// Two-way requests sent on this channel that have not resolved yet
    pub fn outstanding(&self) -> usize {
        self.inflight.get()
    }

    /// The wrapped transport channel
    pub fn raw(&self) -> &Arc<dyn RawChannel> {
        &self.raw
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Send a message without waiting for the transport to flush it.
    ///
    /// Raw payloads are wrapped in a one-way [`Request`]; requests, responses
    /// and text go out as they are.
    pub fn send(&self, message: impl Into<Message>) -> Result<(), ExchangeError> {
        self.send_with(message, false)
    }

    /// Like [`send`](Self::send), with explicit control of the transport's
    /// `sent` flag.
    pub fn send_with(&self, message: impl Into<Message>, sent: bool) -> Result<(), ExchangeError> {
        self.ensure_open("message")?;

        let message = match message.into() {
            Message::Payload(data) => Message::Request(Request::one_way(data)),
            other => other,
        };
        self.raw.send(message, sent)?;
        Ok(())
    }

    /// Send a two-way request and return its handle without waiting.
    ///
    /// `timeout` of `None` uses the configured default.
    pub fn request(
        &self,
        payload: Bytes,
        timeout: Option<Duration>,
    ) -> Result<ResponseFuture, ExchangeError> {
        self.ensure_open("request")?;

        let request = Request::two_way(payload);
        let request_id = request.id();
        let timeout = timeout.unwrap_or(self.config.default_timeout);

        let future = self
            .pending
            .register_scoped(request_id, self.id, self.instance, timeout)?;
        self.inflight.increment();
        let inflight = Arc::clone(&self.inflight);
        future.on_complete(move |_| inflight.decrement());

        // A close may have started between the first check and registration.
        if let Err(err) = self.ensure_open("request") {
            self.pending.abort(request_id, err.clone());
            return Err(err);
        }

        if let Err(err) = self.raw.send(Message::Request(request), false) {
            let err = ExchangeError::from(err);
            self.pending.abort(request_id, err.clone());
            debug!(
                request_id = %request_id,
                channel = %self.id,
                error = %err,
                "Request withdrawn after send failure"
            );
            return Err(err);
        }

        REQUESTS_SENT.inc();
        debug!(
            request_id = %request_id,
            channel = %self.id,
            timeout_ms = timeout.as_millis(),
            "Request sent"
        );
        Ok(future)
    }

    /// Stop accepting new work and signal the peer, without closing.
    pub fn start_close(&self) {
        if self.phase.begin_closing() {
            debug!(channel = %self.id, "Channel closing");
            self.raw.start_close();
        }
    }

    /// Close immediately. Pending invocations issued through this wrapper fail
    /// with `ChannelInactive`. Idempotent.
    ///
    /// A newer wrapper registered for the same raw channel keeps both its
    /// registry slot and its pending invocations.
    pub fn close(&self) {
        if self.phase.finish() == ChannelPhase::Closed {
            return;
        }

        if let Some(registry) = self.registry.upgrade() {
            registry.deregister(self);
        }
        let failed = self
            .pending
            .fail_all_for_instance(self.id, self.instance, "channel closed");
        self.raw.close();

        debug!(channel = %self.id, failed = failed, "Channel closed");
    }

    /// Stop accepting new work, wait up to `timeout` for outstanding requests
    /// to resolve, then [`close`](Self::close). Blocks the calling thread.
    pub fn close_with_timeout(&self, timeout: Duration) {
        if self.phase.load() == ChannelPhase::Closed {
            return;
        }

        self.start_close();
        if !timeout.is_zero() && !self.inflight.wait_idle(timeout) {
            warn!(
                channel = %self.id,
                outstanding = self.inflight.get(),
                timeout_ms = timeout.as_millis(),
                "Close timed out with requests outstanding"
            );
        }
        self.close();
    }

    /// [`close_with_timeout`](Self::close_with_timeout) with the configured
    /// `close_timeout`.
    pub fn close_gracefully(&self) {
        self.close_with_timeout(self.config.close_timeout);
    }

    pub fn is_closed(&self) -> bool {
        self.phase.load() == ChannelPhase::Closed || self.raw.is_closed()
    }

    pub fn is_connected(&self) -> bool {
        self.raw.is_connected()
    }

    pub fn url(&self) -> Option<String> {
        self.raw.url()
    }

    pub fn local_address(&self) -> Option<SocketAddr> {
        self.raw.local_address()
    }

    pub fn remote_address(&self) -> Option<SocketAddr> {
        self.raw.remote_address()
    }

    pub fn channel_handler(&self) -> Option<Arc<dyn ChannelHandler>> {
        self.raw.channel_handler()
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.raw.has_attribute(key)
    }

    pub fn get_attribute(&self, key: &str) -> Option<AttributeValue> {
        self.raw.get_attribute(key)
    }

    pub fn set_attribute(&self, key: &str, value: AttributeValue) {
        self.raw.set_attribute(key, value);
    }

    pub fn remove_attribute(&self, key: &str) {
        self.raw.remove_attribute(key);
    }

    fn ensure_open(&self, kind: &'static str) -> Result<(), ExchangeError> {
        if self.phase.load().is_open() {
            Ok(())
        } else {
            Err(ExchangeError::ChannelClosed {
                channel: self.id,
                kind,
            })
        }
    }
}

impl fmt::Debug for ExchangeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeChannel")
            .field("id", &self.id)
            .field("phase", &self.phase.load())
            .field("outstanding", &self.inflight.get())
            .finish()
    }
}
