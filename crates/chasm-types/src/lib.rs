//! Foundation types for the Chasm content-addressed object store.
//!
//! This crate provides the identity, tree, and commit types used throughout
//! Chasm. Every other Chasm crate depends on `chasm-types`.
//!
//! # Key Types
//!
//! - [`Digest`] — 20-byte SHA-1 content address
//! - [`TreeId`] / [`CommitId`] — strongly typed digest wrappers
//! - [`TreeNodeMap`] — name-sorted, name-unique directory listing
//! - [`Commit`] — immutable record binding a tree into the history graph
//! - [`CommitRef`] — a branch name paired with the commit id it points to
//! - [`ChasmBlob`] / [`ChasmStream`] — object payloads with optional metadata
//! - [`WriteResult`] — the outcome of an idempotent write
//! - [`RequestContext`] — correlation annotations for backend calls

pub mod blob;
pub mod commit;
pub mod context;
pub mod digest;
pub mod error;
pub mod id;
pub mod tree;

pub use blob::{BlobMetadata, ChasmBlob, ChasmStream, WriteResult};
pub use commit::{Audit, Commit, CommitRef};
pub use context::RequestContext;
pub use digest::{Digest, DIGEST_LEN};
pub use error::{DigestError, TreeError};
pub use id::{CommitId, TreeId};
pub use tree::{NodeKind, TreeNode, TreeNodeMap};
