//! Ports Layer
//!
//! Defines the interfaces (traits) for:
//! - Driven Ports (outbound) - the raw transport channel and its event sink
//! - Driving Ports (inbound) - the upstream business handler fed by the dispatcher

pub mod inbound;
pub mod outbound;

pub use inbound::{ReplyError, RequestHandler};
pub use outbound::{AttributeValue, ChannelHandler, RawChannel, TransportError};
