//! Error types for register decoding, scanning and polling

use thiserror::Error;

use crate::types::{DataType, RegisterType};

/// Decode failure, always a caller bug
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Malformed {data_type} value: expected {expected} word(s), got {actual}")]
    MalformedValue {
        data_type: DataType,
        expected: usize,
        actual: usize,
    },
}

/// Scan usage error, raised before any read is attempted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("Invalid scan range: {0}")]
    InvalidRange(String),
}

/// Failure of a single read against the device
///
/// Callers treat every variant the same way: the address is unreadable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("Connection failed: {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("Modbus exception at {address}: {message}")]
    Exception { address: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout waiting for response at address {address}")]
    Timeout { address: u16 },

    #[error("Short response at {address}: expected {expected}, got {actual}")]
    ShortResponse {
        address: u16,
        expected: usize,
        actual: usize,
    },

    #[error("{0} registers cannot be read as {1}")]
    WrongKind(RegisterType, &'static str),
}

/// Failure to read one configured register
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PollError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

pub type Result<T, E = ReadError> = std::result::Result<T, E>;
