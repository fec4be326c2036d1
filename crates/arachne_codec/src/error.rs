//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Float values are not accepted by this codec.
    #[error("float values are forbidden")]
    FloatForbidden,

    /// Indefinite-length items are forbidden in DAG-CBOR.
    #[error("indefinite-length items are forbidden")]
    IndefiniteLengthForbidden,

    /// Invalid UTF-8 string.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Input continued after a complete item.
    #[error("{remaining} trailing bytes after value")]
    TrailingBytes {
        /// Number of bytes left undecoded.
        remaining: usize,
    },

    /// Invalid CBOR structure.
    #[error("invalid CBOR structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },

    /// Unsupported CBOR type.
    #[error("unsupported CBOR type: {type_name}")]
    UnsupportedType {
        /// Name of the unsupported type.
        type_name: String,
    },

    /// A CBOR tag other than 42 (content link).
    #[error("unsupported CBOR tag {0}")]
    UnsupportedTag(u64),

    /// A declared length exceeds the decoder's limits.
    #[error("size limit exceeded: claimed {claimed}, max allowed {max_allowed}")]
    SizeLimitExceeded {
        /// Length claimed by the input.
        claimed: u64,
        /// Maximum length the decoder accepts.
        max_allowed: u64,
    },

    /// Malformed or unsupported content identifier.
    #[error("invalid content hash: {message}")]
    InvalidCid {
        /// What was wrong with it.
        message: String,
    },

    /// Varint longer than 64 bits or truncated.
    #[error("invalid varint")]
    InvalidVarint,

    /// Integer outside the signed 64-bit range.
    #[error("integer overflow")]
    IntegerOverflow,
}

impl CodecError {
    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Create an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    /// Create an invalid content hash error.
    pub fn invalid_cid(message: impl Into<String>) -> Self {
        Self::InvalidCid {
            message: message.into(),
        }
    }
}
