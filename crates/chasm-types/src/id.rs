//! Strongly typed digest wrappers.
//!
//! [`TreeId`] and [`CommitId`] are distinct newtypes over [`Digest`] so that
//! a tree address can never be passed where a commit address is required.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// The address of a serialized tree object.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TreeId(Digest);

/// The address of a serialized commit object.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CommitId(Digest);

macro_rules! digest_id {
    ($name:ident) => {
        impl $name {
            /// The empty id (the zero digest).
            pub const EMPTY: Self = Self(Digest::ZERO);

            /// Wrap a digest.
            pub const fn new(digest: Digest) -> Self {
                Self(digest)
            }

            /// The underlying digest.
            pub fn digest(&self) -> Digest {
                self.0
            }

            /// Returns `true` if this is the empty id.
            pub fn is_empty(&self) -> bool {
                self.0.is_zero()
            }
        }

        impl From<Digest> for $name {
            fn from(digest: Digest) -> Self {
                Self(digest)
            }
        }

        impl From<$name> for Digest {
            fn from(id: $name) -> Digest {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

digest_id!(TreeId);
digest_id!(CommitId);
