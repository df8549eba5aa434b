//! Human-readable JSON codec.
//!
//! Digests are 40-char lowercase hex strings. A bare digest is a JSON
//! string; a commit id wraps its hex in `{"id": …}`; a tree is
//! `{"nodes": [{"name", "kind", "nodeId"}, …]}`; commits use the field names
//! `parents`, `treeId`, `author`, `committer`, `message`.

use serde::{Deserialize, Serialize};

use chasm_types::{Commit, CommitId, Digest, NodeKind, TreeNode, TreeNodeMap};

use crate::error::{CodecError, CodecResult};
use crate::traits::Serializer;

/// The JSON codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Serialize, Deserialize)]
struct CommitIdWire {
    id: CommitId,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TreeNodeWire {
    name: String,
    kind: NodeKind,
    node_id: Digest,
}

#[derive(Serialize, Deserialize)]
struct TreeWire {
    nodes: Vec<TreeNodeWire>,
}

fn encode<T: Serialize>(entity: &'static str, value: &T) -> CodecResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CodecError::Serialization {
        entity,
        cause: e.to_string(),
    })
}

fn decode<'de, T: Deserialize<'de>>(entity: &'static str, bytes: &'de [u8]) -> CodecResult<T> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Serialization {
        entity,
        cause: e.to_string(),
    })
}

impl Serializer for JsonCodec {
    fn serialize_digest(&self, digest: &Digest) -> CodecResult<Vec<u8>> {
        encode("digest", digest)
    }

    fn deserialize_digest(&self, bytes: &[u8]) -> CodecResult<Digest> {
        if bytes.is_empty() {
            return Ok(Digest::ZERO);
        }
        decode("digest", bytes)
    }

    fn serialize_commit_id(&self, id: &CommitId) -> CodecResult<Vec<u8>> {
        encode("commit id", &CommitIdWire { id: *id })
    }

    fn deserialize_commit_id(&self, bytes: &[u8]) -> CodecResult<CommitId> {
        if bytes.is_empty() {
            return Ok(CommitId::EMPTY);
        }
        let wire: CommitIdWire = decode("commit id", bytes)?;
        Ok(wire.id)
    }

    fn serialize_tree(&self, tree: &TreeNodeMap) -> CodecResult<Vec<u8>> {
        let wire = TreeWire {
            nodes: tree
                .iter()
                .map(|n| TreeNodeWire {
                    name: n.name.clone(),
                    kind: n.kind,
                    node_id: n.target,
                })
                .collect(),
        };
        encode("tree", &wire)
    }

    fn deserialize_tree(&self, bytes: &[u8]) -> CodecResult<TreeNodeMap> {
        if bytes.is_empty() {
            return Ok(TreeNodeMap::empty());
        }
        let wire: TreeWire = decode("tree", bytes)?;
        let nodes = wire
            .nodes
            .into_iter()
            .map(|n| TreeNode::new(n.name, n.kind, n.node_id))
            .collect();
        Ok(TreeNodeMap::new(nodes)?)
    }

    fn serialize_commit(&self, commit: &Commit) -> CodecResult<Vec<u8>> {
        encode("commit", commit)
    }

    fn deserialize_commit(&self, bytes: &[u8]) -> CodecResult<Commit> {
        if bytes.is_empty() {
            return Ok(Commit::default());
        }
        decode("commit", bytes)
    }
}
