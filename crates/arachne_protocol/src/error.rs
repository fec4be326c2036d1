//! Error types for the protocol crate.

use arachne_codec::CodecError;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while parsing firehose messages or label frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// DAG-CBOR decoding or encoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The block archive of a commit could not be read.
    #[error("corrupt block archive: {message}")]
    CorruptArchive {
        /// What was wrong with the archive.
        message: String,
    },

    /// A message or frame had the wrong shape.
    #[error("invalid message: {message}")]
    InvalidMessage {
        /// Description of the problem.
        message: String,
    },

    /// A record URI could not be parsed.
    #[error("invalid at-uri '{uri}'")]
    InvalidUri {
        /// The offending URI.
        uri: String,
    },
}

impl ProtocolError {
    /// Create a corrupt archive error.
    pub fn corrupt_archive(message: impl Into<String>) -> Self {
        Self::CorruptArchive {
            message: message.into(),
        }
    }

    /// Create an invalid message error.
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage {
            message: message.into(),
        }
    }
}
