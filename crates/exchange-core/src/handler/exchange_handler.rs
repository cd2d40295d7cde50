//! # Exchange Handler
//!
//! The [`ChannelHandler`] a transport installs on its raw channels.
//!
//! ## Routing of `received`
//!
//! | Inbound | Action |
//! |---------|--------|
//! | `Response` | complete the matching pending invocation |
//! | heartbeat event (two-way) | answer with a heartbeat response |
//! | read-only event | mark the channel with [`READONLY_ATTRIBUTE`] |
//! | broken two-way request | answer `BAD_REQUEST` |
//! | two-way request | upstream `reply`, answer OK or the error status |
//! | one-way request | upstream `received` with the payload |
//! | text / payload | upstream `received` |
//!
//! Replies go straight to the raw channel, so requests accepted before a
//! `start_close` are still answered while the wrapper is CLOSING.

use crate::ports::{ChannelHandler, RawChannel, RequestHandler, TransportError};
use crate::service::ChannelRegistry;
use exchange_types::{Message, Request, Response, Status};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Attribute set on a raw channel once its peer announced it went read-only.
pub const READONLY_ATTRIBUTE: &str = "channel.readonly";

/// Dispatcher between the transport and the upstream [`RequestHandler`].
pub struct ExchangeHandler {
    registry: Arc<ChannelRegistry>,
    upstream: Arc<dyn RequestHandler>,
}

impl ExchangeHandler {
    pub fn new(registry: Arc<ChannelRegistry>, upstream: Arc<dyn RequestHandler>) -> Self {
        Self { registry, upstream }
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    fn handle_response(&self, response: Response) {
        let request_id = response.id();
        if response.is_heartbeat() && !self.registry.pending().is_pending(&request_id) {
            trace!(request_id = %request_id, "Heartbeat response received");
            return;
        }
        self.registry.pending().complete(response);
    }

    fn handle_event(
        &self,
        raw: &Arc<dyn RawChannel>,
        request: &Request,
    ) -> Result<(), TransportError> {
        if request.is_heartbeat() {
            if request.is_two_way() {
                raw.send(Message::Response(Response::heartbeat(request.id())), false)?;
            }
            trace!(channel = %raw.id(), "Heartbeat request received");
        } else if request.is_readonly_event() {
            raw.set_attribute(READONLY_ATTRIBUTE, Arc::new(true));
            debug!(channel = %raw.id(), "Peer went read-only");
        }
        Ok(())
    }

    fn handle_request(
        &self,
        raw: &Arc<dyn RawChannel>,
        request: Request,
    ) -> Result<(), TransportError> {
        if request.is_event() {
            return self.handle_event(raw, &request);
        }

        if request.is_broken() {
            let reason = String::from_utf8_lossy(request.data());
            if !request.is_two_way() {
                warn!(
                    channel = %raw.id(),
                    request_id = %request.id(),
                    reason = %reason,
                    "Dropping undecodable one-way request"
                );
                return Ok(());
            }
            let response = Response::error(
                request.id(),
                Status::BadRequest,
                format!("Fail to decode request due to: {reason}"),
            );
            return raw.send(Message::Response(response), false);
        }

        let channel = self.registry.channel_for(raw);
        if !request.is_two_way() {
            return self
                .upstream
                .received(&channel, Message::Payload(request.data().clone()));
        }

        let response = match self.upstream.reply(&channel, &request) {
            Ok(result) => Response::ok(request.id(), result),
            Err(err) => {
                debug!(
                    channel = %raw.id(),
                    request_id = %request.id(),
                    error = %err,
                    "Upstream reply failed"
                );
                Response::error(request.id(), err.status(), err.to_string())
            }
        };
        raw.send(Message::Response(response), false)
    }
}

impl ChannelHandler for ExchangeHandler {
    fn connected(&self, raw: &Arc<dyn RawChannel>) -> Result<(), TransportError> {
        let channel = self.registry.channel_for(raw);
        self.upstream.connected(&channel);
        Ok(())
    }

    fn disconnected(&self, raw: &Arc<dyn RawChannel>) -> Result<(), TransportError> {
        let channel = self.registry.channel_for(raw);
        self.upstream.disconnected(&channel);

        let failed = self
            .registry
            .pending()
            .fail_all_for_channel(raw.id(), "channel disconnected");
        self.registry.remove_channel_if_disconnected(raw);

        debug!(channel = %raw.id(), failed = failed, "Channel disconnected");
        Ok(())
    }

    fn sent(&self, raw: &Arc<dyn RawChannel>, message: &Message) -> Result<(), TransportError> {
        let channel = self.registry.channel_for(raw);
        self.upstream.sent(&channel, message);
        Ok(())
    }

    fn received(
        &self,
        raw: &Arc<dyn RawChannel>,
        message: Message,
    ) -> Result<(), TransportError> {
        match message {
            Message::Response(response) => {
                self.handle_response(response);
                Ok(())
            }
            Message::Request(request) => self.handle_request(raw, request),
            other => {
                let channel = self.registry.channel_for(raw);
                self.upstream.received(&channel, other)
            }
        }
    }

    fn caught(
        &self,
        raw: &Arc<dyn RawChannel>,
        error: &TransportError,
    ) -> Result<(), TransportError> {
        let channel = self.registry.channel_for(raw);
        self.upstream.caught(&channel, error);
        Ok(())
    }
}
