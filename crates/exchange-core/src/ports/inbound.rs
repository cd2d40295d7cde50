//! Inbound Ports (Driving Ports)
//!
//! The upstream business handler. The dispatcher hands it every inbound
//! request and application message that is not part of the exchange
//! protocol itself.

use crate::ports::outbound::TransportError;
use crate::service::ExchangeChannel;
use bytes::Bytes;
use exchange_types::{Message, Request, Status};
use std::sync::Arc;
use thiserror::Error;

/// Failure of an upstream `reply`, turned into an error `Response`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("{0}")]
    Failed(String),
}

impl ReplyError {
    /// Status of the response sent back for this error.
    pub fn status(&self) -> Status {
        match self {
            ReplyError::ServiceNotFound(_) => Status::ServiceNotFound,
            ReplyError::Failed(_) => Status::ServiceError,
        }
    }
}

/// Business handler sitting above the exchange layer.
pub trait RequestHandler: Send + Sync {
    /// Answer a two-way request. The returned bytes become the result of an
    /// OK response.
    fn reply(
        &self,
        channel: &Arc<ExchangeChannel>,
        request: &Request,
    ) -> Result<Bytes, ReplyError>;

    /// One-way requests (as their payload), text and raw payload messages.
    fn received(
        &self,
        _channel: &Arc<ExchangeChannel>,
        _message: Message,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    fn connected(&self, _channel: &Arc<ExchangeChannel>) {}

    fn disconnected(&self, _channel: &Arc<ExchangeChannel>) {}

    fn sent(&self, _channel: &Arc<ExchangeChannel>, _message: &Message) {}

    fn caught(&self, _channel: &Arc<ExchangeChannel>, _error: &TransportError) {}
}
