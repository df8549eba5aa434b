//! The repository error taxonomy.
//!
//! Not-found is never an error on read paths: those return `Option` or omit
//! the entry from a batch result.

use chasm_codec::CodecError;
use thiserror::Error;

/// Errors surfaced by repository operations.
#[derive(Debug, Error)]
pub enum ChasmError {
    /// A required argument was missing or blank. Names the argument.
    #[error("missing or blank required argument: {name}")]
    InvalidArgument { name: &'static str },

    /// The codec produced or consumed an unexpected shape.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A compare-and-swap ref write observed a different current value.
    #[error("concurrent update on commit ref {namespace}/{branch}")]
    Conflict { namespace: String, branch: String },

    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend failure not covered by the cases above.
    #[error("backend error: {0}")]
    Backend(String),

    /// The operation observed its cancellation token.
    #[error("operation cancelled")]
    Cancelled,
}

/// Result alias for repository operations.
pub type ChasmResult<T> = Result<T, ChasmError>;
