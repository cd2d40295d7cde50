//! # Request / Response Envelopes
//!
//! The two addressable envelopes of the exchange protocol.
//!
//! - A `Request` gets a fresh process-unique [`RequestId`] when built through
//!   the convenience constructors.
//! - A `Response` echoes the originating request's ID.
//! - `error_message` is present iff the status is not [`Status::Ok`].

use crate::ids::RequestId;
use crate::status::Status;
use crate::{HEARTBEAT_EVENT, PROTOCOL_VERSION, READONLY_EVENT};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Addressable request envelope. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    id: RequestId,
    version: String,
    twoway: bool,
    is_event: bool,
    broken: bool,
    data: Bytes,
}

impl Request {
    /// A request expecting a correlated response.
    pub fn two_way(data: Bytes) -> Self {
        Self::from_parts(RequestId::next(), PROTOCOL_VERSION, true, false, data)
    }

    /// A fire-and-forget request.
    pub fn one_way(data: Bytes) -> Self {
        Self::from_parts(RequestId::next(), PROTOCOL_VERSION, false, false, data)
    }

    /// A control event (heartbeat, read-only notice).
    pub fn event(data: Bytes, twoway: bool) -> Self {
        Self::from_parts(RequestId::next(), PROTOCOL_VERSION, twoway, true, data)
    }

    /// Two-way heartbeat probe.
    pub fn heartbeat() -> Self {
        Self::event(Bytes::from_static(HEARTBEAT_EVENT), true)
    }

    /// One-way notice that the sender stopped accepting new requests.
    pub fn readonly() -> Self {
        Self::event(Bytes::from_static(READONLY_EVENT), false)
    }

    /// Rebuild a request from decoded fields, keeping the peer's ID.
    pub fn from_parts(
        id: RequestId,
        version: impl Into<String>,
        twoway: bool,
        is_event: bool,
        data: Bytes,
    ) -> Self {
        Self {
            id,
            version: version.into(),
            twoway,
            is_event,
            broken: false,
            data,
        }
    }

    /// A two-way request the codec could not decode. `data` holds the decode
    /// failure description.
    pub fn broken(id: RequestId, data: Bytes) -> Self {
        Self {
            id,
            version: PROTOCOL_VERSION.to_string(),
            twoway: true,
            is_event: false,
            broken: true,
            data,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_two_way(&self) -> bool {
        self.twoway
    }

    pub fn is_event(&self) -> bool {
        self.is_event
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    pub fn is_heartbeat(&self) -> bool {
        self.is_event && self.data.as_ref() == HEARTBEAT_EVENT
    }

    pub fn is_readonly_event(&self) -> bool {
        self.is_event && self.data.as_ref() == READONLY_EVENT
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

/// Response envelope correlated to a request by ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    id: RequestId,
    version: String,
    status: Status,
    is_event: bool,
    result: Bytes,
    error_message: Option<String>,
}

impl Response {
    /// Successful response carrying `result`.
    pub fn ok(id: RequestId, result: Bytes) -> Self {
        Self {
            id,
            version: PROTOCOL_VERSION.to_string(),
            status: Status::Ok,
            is_event: false,
            result,
            error_message: None,
        }
    }

    /// Failed response. `status` must not be [`Status::Ok`].
    pub fn error(id: RequestId, status: Status, message: impl Into<String>) -> Self {
        debug_assert!(!status.is_ok(), "error response built with OK status");
        Self {
            id,
            version: PROTOCOL_VERSION.to_string(),
            status,
            is_event: false,
            result: Bytes::new(),
            error_message: Some(message.into()),
        }
    }

    /// Heartbeat answer for the request `id`.
    pub fn heartbeat(id: RequestId) -> Self {
        Self {
            is_event: true,
            ..Self::ok(id, Bytes::from_static(HEARTBEAT_EVENT))
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    pub fn is_event(&self) -> bool {
        self.is_event
    }

    pub fn is_heartbeat(&self) -> bool {
        self.is_event && self.result.as_ref() == HEARTBEAT_EVENT
    }

    pub fn result(&self) -> &Bytes {
        &self.result
    }

    /// Failure description; `None` for OK responses.
    pub fn error_message(&self) -> Option<&str> {
        if self.status.is_ok() {
            None
        } else {
            self.error_message.as_deref()
        }
    }
}
