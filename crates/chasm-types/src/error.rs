//! Boundary error types for malformed digests and tree structures.

use thiserror::Error;

/// Errors from constructing a [`crate::Digest`] out of untrusted input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DigestError {
    /// The byte sequence does not have the digest length.
    #[error("invalid digest length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// The string is not a well-formed hex digest.
    #[error("invalid digest format: {reason}")]
    InvalidFormat { reason: String },
}

/// Errors from constructing a [`crate::TreeNodeMap`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// Two nodes share the same name.
    #[error("duplicate tree node name: {name}")]
    DuplicateName { name: String },

    /// A node has an empty name.
    #[error("tree node name must not be empty")]
    EmptyNodeName,
}
