use quotr_protocol::ProtocolError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    ProtocolError(#[from] ProtocolError),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("No connections configured")]
    NoConnections,

    #[error("Empty batch")]
    EmptyBatch,

    #[error("Unexpected response for operation")]
    UnexpectedResponse,
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_converts() {
        let err: Error = ProtocolError::EmptyKey.into();
        assert!(matches!(err, Error::ProtocolError(ProtocolError::EmptyKey)));
    }

    #[test]
    fn display_is_stable() {
        assert_eq!(Error::ConnectionClosed.to_string(), "Connection closed");
        assert_eq!(
            Error::Timeout("read".into()).to_string(),
            "Timeout: read",
        );
    }
}
