use chasm_types::{Commit, CommitId, Digest, TreeNodeMap};

use crate::error::CodecResult;

/// Codec contract between the repository layer and a wire format.
///
/// All implementations must satisfy these invariants:
/// - Round-trip: `deserialize(serialize(v))` equals `v` for every entity.
/// - Empty input: deserializing a zero-length slice yields the default value
///   for the type, never an error. The repository layer relies on this to
///   treat an empty payload as "absent".
/// - Stability: equal inputs produce equal bytes within one codec. Different
///   codecs are free to produce different bytes, which is why the codec is
///   fixed for the lifetime of a store.
///
/// Implementations are stateless after construction and freely shared across
/// threads.
pub trait Serializer: Send + Sync {
    /// Encode a digest.
    fn serialize_digest(&self, digest: &Digest) -> CodecResult<Vec<u8>>;

    /// Decode a digest. Empty input yields [`Digest::ZERO`].
    fn deserialize_digest(&self, bytes: &[u8]) -> CodecResult<Digest>;

    /// Encode a commit id.
    fn serialize_commit_id(&self, id: &CommitId) -> CodecResult<Vec<u8>>;

    /// Decode a commit id. Empty input yields [`CommitId::EMPTY`].
    fn deserialize_commit_id(&self, bytes: &[u8]) -> CodecResult<CommitId>;

    /// Encode a tree node map.
    fn serialize_tree(&self, tree: &TreeNodeMap) -> CodecResult<Vec<u8>>;

    /// Decode a tree node map. Empty input yields the empty map.
    fn deserialize_tree(&self, bytes: &[u8]) -> CodecResult<TreeNodeMap>;

    /// Encode a commit.
    fn serialize_commit(&self, commit: &Commit) -> CodecResult<Vec<u8>>;

    /// Decode a commit. Empty input yields the default commit.
    fn deserialize_commit(&self, bytes: &[u8]) -> CodecResult<Commit>;
}
