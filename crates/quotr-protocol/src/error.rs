//! Protocol error types

use crate::types::RequestType;
use thiserror::Error;

/// Errors raised by the wire codec.
///
/// Encoding-side variants (`KeyTooLong`, `EmptyKey`, `ValueOutOfRange`) are
/// caller-contract failures and surface before anything touches the network.
/// Decoding-side variants mean the stream position is no longer trustworthy
/// and the owning connection must be torn down.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A key or channel name does not fit the 1-byte length prefix
    #[error("key length {0} exceeds the 255-byte wire limit")]
    KeyTooLong(usize),

    /// A key or channel name is empty
    #[error("key must not be empty")]
    EmptyKey,

    /// A numeric field does not fit the configured value width
    #[error("{field} value {value} exceeds maximum {max} for the configured value size")]
    ValueOutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },

    /// A 1-byte enum field held a byte outside its closed set
    #[error("invalid {field} byte: 0x{value:02x}")]
    InvalidEnum { field: &'static str, value: u8 },

    /// A connection identifier was not 32 hex characters
    #[error("connection id must be 32 hexadecimal characters")]
    InvalidConnectionId,

    /// A declared fragment or record count implies more bytes than the
    /// decoder is willing to buffer
    #[error("declared response size {declared} exceeds maximum {max}")]
    ResponseTooLarge { declared: usize, max: usize },

    /// The operation has no response shape known to the decoder
    #[error("operation {0:?} has no decodable response shape")]
    UnsupportedOperation(RequestType),
}

impl ProtocolError {
    pub(crate) fn invalid_enum(field: &'static str, value: u8) -> Self {
        ProtocolError::InvalidEnum { field, value }
    }
}

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtocolError::KeyTooLong(300);
        assert_eq!(err.to_string(), "key length 300 exceeds the 255-byte wire limit");

        let err = ProtocolError::invalid_enum("ttl type", 0x99);
        assert_eq!(err.to_string(), "invalid ttl type byte: 0x99");

        let err = ProtocolError::ValueOutOfRange {
            field: "quota",
            value: 300,
            max: 255,
        };
        assert!(err.to_string().contains("quota value 300"));

        let err = ProtocolError::UnsupportedOperation(RequestType::Event);
        assert!(err.to_string().contains("Event"));
    }
}
