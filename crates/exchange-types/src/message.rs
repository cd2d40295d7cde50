//! What a raw channel carries.

use crate::envelope::{Request, Response};
use bytes::Bytes;

/// A message handed to or received from a raw channel.
///
/// `Payload` is an application object that has not been enveloped yet; the
/// exchange layer wraps it into a one-way [`Request`] before it reaches the
/// transport. The other variants travel as they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Request(Request),
    Response(Response),
    /// Plain string control message.
    Text(String),
    Payload(Bytes),
}

impl Message {
    /// Kind name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Request(_) => "request",
            Message::Response(_) => "response",
            Message::Text(_) => "text",
            Message::Payload(_) => "payload",
        }
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Message::Request(request)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Message::Response(response)
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::Text(text)
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::Text(text.to_string())
    }
}

impl From<Bytes> for Message {
    fn from(payload: Bytes) -> Self {
        Message::Payload(payload)
    }
}
