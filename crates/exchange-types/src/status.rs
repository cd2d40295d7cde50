//! Response status codes.

use crate::errors::StatusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome carried by a `Response`.
///
/// Byte values follow the classic exchange protocol so that peers speaking
/// it agree on the meaning of each status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    ClientTimeout,
    ServerTimeout,
    ChannelInactive,
    BadRequest,
    BadResponse,
    ServiceNotFound,
    ServiceError,
    ServerError,
    ClientError,
    ServerThreadpoolExhaustedError,
}

impl Status {
    /// Wire code of this status.
    pub const fn code(&self) -> u8 {
        match self {
            Status::Ok => 20,
            Status::ClientTimeout => 30,
            Status::ServerTimeout => 31,
            Status::ChannelInactive => 35,
            Status::BadRequest => 40,
            Status::BadResponse => 50,
            Status::ServiceNotFound => 60,
            Status::ServiceError => 70,
            Status::ServerError => 80,
            Status::ClientError => 90,
            Status::ServerThreadpoolExhaustedError => 100,
        }
    }

    pub const fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl TryFrom<u8> for Status {
    type Error = StatusError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            20 => Status::Ok,
            30 => Status::ClientTimeout,
            31 => Status::ServerTimeout,
            35 => Status::ChannelInactive,
            40 => Status::BadRequest,
            50 => Status::BadResponse,
            60 => Status::ServiceNotFound,
            70 => Status::ServiceError,
            80 => Status::ServerError,
            90 => Status::ClientError,
            100 => Status::ServerThreadpoolExhaustedError,
            other => return Err(StatusError::UnknownCode(other)),
        })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Ok => "OK",
            Status::ClientTimeout => "CLIENT_TIMEOUT",
            Status::ServerTimeout => "SERVER_TIMEOUT",
            Status::ChannelInactive => "CHANNEL_INACTIVE",
            Status::BadRequest => "BAD_REQUEST",
            Status::BadResponse => "BAD_RESPONSE",
            Status::ServiceNotFound => "SERVICE_NOT_FOUND",
            Status::ServiceError => "SERVICE_ERROR",
            Status::ServerError => "SERVER_ERROR",
            Status::ClientError => "CLIENT_ERROR",
            Status::ServerThreadpoolExhaustedError => "SERVER_THREADPOOL_EXHAUSTED_ERROR",
        };
        write!(f, "{name}")
    }
}
