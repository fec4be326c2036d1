//! Error types for the label server.

use arachne_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the label server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The cursor query parameter is not an integer.
    #[error("Invalid cursor '{0}'")]
    InvalidCursor(String),

    /// A read started below the retention floor of the log.
    #[error("offset {requested} is below the retention floor {floor}")]
    OffsetOutOfRange {
        /// Offset that was asked for.
        requested: u64,
        /// Lowest retained offset.
        floor: u64,
    },

    /// Encoding a frame failed.
    #[error("codec error: {0}")]
    Codec(#[from] ProtocolError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, ServerError::InvalidCursor(_))
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            ServerError::OffsetOutOfRange { .. }
                | ServerError::Codec(_)
                | ServerError::Internal(_)
                | ServerError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidCursor("abc".into()).is_client_error());
        assert!(!ServerError::InvalidCursor("abc".into()).is_server_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(ServerError::OffsetOutOfRange {
            requested: 1,
            floor: 5
        }
        .is_server_error());
    }

    #[test]
    fn invalid_cursor_message_is_client_facing() {
        let err = ServerError::InvalidCursor("abc".into());
        assert_eq!(err.to_string(), "Invalid cursor 'abc'");
    }
}
