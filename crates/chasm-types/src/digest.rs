use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest as _, Sha1};

use crate::error::DigestError;

/// Length of a digest in bytes.
pub const DIGEST_LEN: usize = 20;

/// Content address for any stored object.
///
/// A `Digest` is the SHA-1 hash of an object's bytes. Identical content
/// always produces the same `Digest`, making objects deduplicatable and
/// verifiable. Ordering is lexicographic over the raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// The all-zero digest. Represents "no object".
    pub const ZERO: Self = Self([0u8; DIGEST_LEN]);

    /// Compute the digest of a byte slice.
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Create a digest from a pre-computed hash.
    pub const fn from_raw(raw: [u8; DIGEST_LEN]) -> Self {
        Self(raw)
    }

    /// Construct from a byte slice, which must be exactly [`DIGEST_LEN`] long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DigestError> {
        let raw: [u8; DIGEST_LEN] =
            bytes
                .try_into()
                .map_err(|_| DigestError::InvalidLength {
                    expected: DIGEST_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(raw))
    }

    /// Parse from a hex string.
    ///
    /// Accepts the plain 40-character form and a dash-separated form; dashes
    /// are stripped before decoding.
    pub fn from_hex(s: &str) -> Result<Self, DigestError> {
        let compact: String = if s.contains('-') {
            s.chars().filter(|c| *c != '-').collect()
        } else {
            s.to_string()
        };
        let bytes = hex::decode(&compact).map_err(|e| DigestError::InvalidFormat {
            reason: e.to_string(),
        })?;
        if bytes.len() != DIGEST_LEN {
            return Err(DigestError::InvalidFormat {
                reason: format!("expected {} hex chars, got {}", DIGEST_LEN * 2, compact.len()),
            });
        }
        Self::from_bytes(&bytes)
    }

    /// Returns `true` if this is the all-zero digest.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; DIGEST_LEN]
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Hex-encoded string representation (40 lowercase chars).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Split the hex form for a sharded path.
    ///
    /// Returns the first `2 * prefix_len` hex characters and the remaining
    /// `40 - 2 * prefix_len`, used to form the `<prefix>/<remainder>` object
    /// path on disk.
    pub fn split(&self, prefix_len: usize) -> (String, String) {
        let hex = self.to_hex();
        let at = (prefix_len * 2).min(hex.len());
        let (prefix, rest) = hex.split_at(at);
        (prefix.to_string(), rest.to_string())
    }
}

impl Default for Digest {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; DIGEST_LEN]> for Digest {
    fn from(raw: [u8; DIGEST_LEN]) -> Self {
        Self(raw)
    }
}

impl From<Digest> for [u8; DIGEST_LEN] {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

// The wire representation is the 40-char hex string, matching the JSON codec.
impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::from_hex(&s).map_err(D::Error::custom)
    }
}
