//! Inbound dispatch from the transport into the exchange layer.

pub mod exchange_handler;

pub use exchange_handler::{ExchangeHandler, READONLY_ATTRIBUTE};
