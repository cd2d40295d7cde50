//! # Exchange Core
//!
//! Request/response exchange on top of a raw bidirectional message channel.
//!
//! ## Architecture (Hexagonal)
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  RequestHandler (inbound port)               │
//! └──────────────────────────────▲───────────────────────────────┘
//!                                │ reply / received
//! ┌──────────────────────────────┴───────────────────────────────┐
//! │  ExchangeHandler ──> ChannelRegistry ──> ExchangeChannel     │
//! │         │                                      │             │
//! │         └──────────> PendingTable <────────────┘             │
//! │                          ▲                                   │
//! │                    timeout sweeper                           │
//! └──────────────────────────┬───────────────────────────────────┘
//!                            │ send / close
//! ┌──────────────────────────▼───────────────────────────────────┐
//! │               RawChannel / ChannelHandler (outbound ports)   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Each pending invocation resolves exactly once: response, timeout sweep,
//!   or owning channel close, whichever the table applies first.
//! - Responses are matched by request ID only.
//! - A channel's phase only moves forward: OPEN, CLOSING, CLOSED.
//! - `request` never blocks; callers wait, await, or attach a continuation.

pub mod adapters;
pub mod domain;
pub mod error;
pub mod handler;
pub mod ports;
pub mod service;
pub mod sweeper;

pub use adapters::MemoryChannel;
pub use domain::{
    ChannelPhase, ExchangeConfig, InflightCounter, Outcome, PendingStats, PendingTable,
    ResponseFuture,
};
pub use error::{ConfigError, ExchangeError};
pub use handler::{ExchangeHandler, READONLY_ATTRIBUTE};
pub use ports::{
    AttributeValue, ChannelHandler, RawChannel, ReplyError, RequestHandler, TransportError,
};
pub use service::{ChannelRegistry, ExchangeChannel};
pub use sweeper::{spawn_timeout_sweeper, timeout_sweep_task};

pub use exchange_types::{ChannelId, Message, Request, RequestId, Response, Status};
