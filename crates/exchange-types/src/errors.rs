//! # Error Types

use thiserror::Error;

/// Errors raised while interpreting envelope fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    /// Status byte does not map to a known status.
    #[error("Unknown response status code: {0}")]
    UnknownCode(u8),
}
