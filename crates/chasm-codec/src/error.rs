//! Error types for codec operations.

use chasm_types::{DigestError, TreeError};
use thiserror::Error;

/// Errors that can occur while encoding or decoding an entity.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The codec produced or consumed an unexpected shape.
    #[error("failed to serialize {entity}: {cause}")]
    Serialization { entity: &'static str, cause: String },

    /// The input ended before the record was complete.
    #[error("truncated {entity}: needed {needed} more bytes, {remaining} remaining")]
    Truncated {
        entity: &'static str,
        needed: usize,
        remaining: usize,
    },

    /// Bytes were left over after a complete record.
    #[error("trailing bytes after {entity}: {remaining} unconsumed")]
    TrailingBytes {
        entity: &'static str,
        remaining: usize,
    },

    /// An unknown node kind tag was read.
    #[error("invalid tree node kind tag: {0:#04x}")]
    InvalidKind(u8),

    /// The payload has the wrong length for the entity.
    #[error("invalid {entity} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        entity: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A digest embedded in the payload is malformed.
    #[error(transparent)]
    Digest(#[from] DigestError),

    /// A decoded tree violates the map invariants.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
