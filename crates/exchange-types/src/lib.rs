//! # Exchange Types Crate
//!
//! Envelope types carried over a raw channel by the exchange layer.
//!
//! ## Design Principles
//!
//! - **Immutable envelopes**: `Request` and `Response` are built once and read
//!   through accessors.
//! - **Correlation by ID only**: a `Response` carries the `RequestId` of the
//!   request that produced it; arrival order is irrelevant.
//! - **Opaque payloads**: application data is `Bytes`; encoding belongs to the
//!   codec sitting below the exchange layer.

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod message;
pub mod status;

pub use envelope::{Request, Response};
pub use errors::StatusError;
pub use ids::{ChannelId, RequestId};
pub use message::Message;
pub use status::Status;

/// Protocol version stamped on every envelope created by this process.
pub const PROTOCOL_VERSION: &str = "2.0.2";

/// Event payload marking a heartbeat request/response.
pub const HEARTBEAT_EVENT: &[u8] = b"";

/// Event payload announcing that the sender went read-only.
pub const READONLY_EVENT: &[u8] = b"R";
