//! Error types

use crate::protocol::constants::isc;
use crate::protocol::StatusVector;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the wire engine
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on an established connection
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Socket could not be opened
    #[error("unable to complete network request to host \"{server}\": {source}")]
    Network {
        /// Server the connection was made to
        server: String,
        /// Underlying failure
        #[source]
        source: io::Error,
    },

    /// Connect timeout expired
    #[error("connection to host \"{server}\" timed out after {timeout:?}")]
    ConnectTimeout {
        /// Server the connection was made to
        server: String,
        /// Configured connect timeout
        timeout: Duration,
    },

    /// Read timeout expired while waiting for the server
    #[error("read timed out after {0:?}")]
    ReadTimeout(Duration),

    /// Stream ended or produced malformed framing; byte alignment is lost
    #[error("framing error: {0}")]
    Framing(String),

    /// A value does not fit the length field the protocol defines for it
    #[error("value too large: {0}")]
    ValueTooLarge(String),

    /// Unexpected or malformed protocol message
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Server accepted a protocol version the client does not know
    #[error("unsupported or unexpected protocol version {version} connecting to {server}; supported: {supported:?}")]
    UnsupportedProtocol {
        /// Version reported by the server
        version: i32,
        /// Server name
        server: String,
        /// Versions offered by the client
        supported: Vec<i32>,
    },

    /// Server rejected the connect request
    #[error("connection rejected by {server}")]
    ConnectionRejected {
        /// Server name
        server: String,
        /// Status sent by the server, if any
        status: Option<StatusVector>,
    },

    /// Authentication failed
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Wire encryption could not be established
    #[error("wire encryption failed: {0}")]
    Encryption(String),

    /// Error reported by the server in a status vector
    #[error("{0}")]
    Server(StatusVector),

    /// Operation not supported by the negotiated protocol version
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// Invalid state transition
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// One or more resources failed to close
    #[error("{} error(s) closing connection, first: {}", .0.len(), first_message(.0))]
    Close(Vec<io::Error>),

    /// Connection closed by the peer or already disconnected
    #[error("connection closed")]
    ConnectionClosed,
}

fn first_message(errors: &[io::Error]) -> String {
    errors
        .first()
        .map(|e| e.to_string())
        .unwrap_or_default()
}

impl Error {
    /// Whether this error belongs to the network category
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Network { .. }
                | Error::ConnectTimeout { .. }
                | Error::ReadTimeout(_)
                | Error::ConnectionClosed
        )
    }

    /// Whether the connection must be abandoned after this error
    ///
    /// Server-reported errors leave the channel aligned and usable; every
    /// other failure leaves the stream in an unknown position.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::Server(_)
                | Error::NotSupported(_)
                | Error::InvalidState { .. }
                | Error::Config(_)
                | Error::ValueTooLarge(_)
        )
    }

    /// Firebird (ISC) error code for this error
    pub fn error_code(&self) -> Option<i32> {
        match self {
            Error::Server(status) => status.error_code(),
            Error::ConnectionRejected { status: Some(status), .. } => status.error_code(),
            Error::ConnectionRejected { status: None, .. } | Error::Authentication(_) => {
                Some(isc::LOGIN)
            }
            Error::Network { .. } | Error::ConnectTimeout { .. } => Some(isc::NETWORK_ERROR),
            Error::Io(_) | Error::ReadTimeout(_) | Error::Framing(_) => Some(isc::NET_READ_ERR),
            Error::Encryption(_) => Some(isc::WIRECRYPT_INCOMPATIBLE),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_category() {
        let err = Error::Network {
            server: "db.example.com".into(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(err.is_network());
        assert!(err.is_fatal());
        assert_eq!(err.error_code(), Some(isc::NETWORK_ERROR));
        assert!(err.to_string().contains("db.example.com"));
    }

    #[test]
    fn test_config_not_fatal() {
        let err = Error::Config("bad".into());
        assert!(!err.is_fatal());
        assert!(!err.is_network());
    }

    #[test]
    fn test_close_aggregates_messages() {
        let err = Error::Close(vec![
            io::Error::new(io::ErrorKind::BrokenPipe, "output"),
            io::Error::new(io::ErrorKind::Other, "socket"),
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("2 error(s)"));
        assert!(msg.contains("output"));
    }

    #[test]
    fn test_rejected_without_status_is_login_error() {
        let err = Error::ConnectionRejected {
            server: "localhost".into(),
            status: None,
        };
        assert_eq!(err.error_code(), Some(isc::LOGIN));
    }
}
