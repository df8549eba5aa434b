//! Compact binary codec: length-prefixed records, big-endian integers.
//!
//! Record layouts:
//!
//! ```text
//! digest      [20 bytes]
//! commit id   [20 bytes]
//! tree        [u32 count] ([u32 name len][name][1 kind byte][20-byte digest])*
//! commit      [u32 count] [20-byte parent]*  [20-byte tree id]
//!             [audit: u32 name len][name][i64 ticks][i64 offset]   (author)
//!             [audit: u32 name len][name][i64 ticks][i64 offset]   (committer)
//!             [1 presence byte] [u32 len][message]?
//! ```

use chasm_types::{Audit, Commit, CommitId, Digest, NodeKind, TreeId, TreeNode, TreeNodeMap, DIGEST_LEN};

use crate::error::{CodecError, CodecResult};
use crate::traits::Serializer;

const KIND_BLOB: u8 = 0;
const KIND_TREE: u8 = 1;

/// The length-prefixed binary codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryCodec;

impl BinaryCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for BinaryCodec {
    fn serialize_digest(&self, digest: &Digest) -> CodecResult<Vec<u8>> {
        Ok(digest.as_bytes().to_vec())
    }

    fn deserialize_digest(&self, bytes: &[u8]) -> CodecResult<Digest> {
        if bytes.is_empty() {
            return Ok(Digest::ZERO);
        }
        if bytes.len() != DIGEST_LEN {
            return Err(CodecError::InvalidLength {
                entity: "digest",
                expected: DIGEST_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Digest::from_bytes(bytes)?)
    }

    fn serialize_commit_id(&self, id: &CommitId) -> CodecResult<Vec<u8>> {
        Ok(id.digest().as_bytes().to_vec())
    }

    fn deserialize_commit_id(&self, bytes: &[u8]) -> CodecResult<CommitId> {
        if bytes.is_empty() {
            return Ok(CommitId::EMPTY);
        }
        if bytes.len() != DIGEST_LEN {
            return Err(CodecError::InvalidLength {
                entity: "commit id",
                expected: DIGEST_LEN,
                actual: bytes.len(),
            });
        }
        Ok(CommitId::new(Digest::from_bytes(bytes)?))
    }

    fn serialize_tree(&self, tree: &TreeNodeMap) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::new();
        put_u32(&mut buf, tree.len() as u32);
        for node in tree {
            put_str(&mut buf, &node.name);
            buf.push(kind_tag(node.kind));
            buf.extend_from_slice(node.target.as_bytes());
        }
        Ok(buf)
    }

    fn deserialize_tree(&self, bytes: &[u8]) -> CodecResult<TreeNodeMap> {
        if bytes.is_empty() {
            return Ok(TreeNodeMap::empty());
        }
        let mut reader = Reader::new(bytes, "tree");
        let count = reader.read_u32()?;
        let mut nodes = Vec::with_capacity(count.min(4096) as usize);
        for _ in 0..count {
            let name = reader.read_string()?;
            let kind = parse_kind(reader.read_u8()?)?;
            let target = reader.read_digest()?;
            nodes.push(TreeNode::new(name, kind, target));
        }
        reader.finish()?;
        Ok(TreeNodeMap::new(nodes)?)
    }

    fn serialize_commit(&self, commit: &Commit) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::new();
        put_u32(&mut buf, commit.parents.len() as u32);
        for parent in &commit.parents {
            buf.extend_from_slice(parent.digest().as_bytes());
        }
        buf.extend_from_slice(commit.tree_id.digest().as_bytes());
        put_audit(&mut buf, &commit.author);
        put_audit(&mut buf, &commit.committer);
        match &commit.message {
            None => buf.push(0),
            Some(message) => {
                buf.push(1);
                put_str(&mut buf, message);
            }
        }
        Ok(buf)
    }

    fn deserialize_commit(&self, bytes: &[u8]) -> CodecResult<Commit> {
        if bytes.is_empty() {
            return Ok(Commit::default());
        }
        let mut reader = Reader::new(bytes, "commit");
        let count = reader.read_u32()?;
        let mut parents = Vec::with_capacity(count.min(4096) as usize);
        for _ in 0..count {
            parents.push(CommitId::new(reader.read_digest()?));
        }
        let tree_id = TreeId::new(reader.read_digest()?);
        let author = reader.read_audit()?;
        let committer = reader.read_audit()?;
        let message = match reader.read_u8()? {
            0 => None,
            _ => Some(reader.read_string()?),
        };
        reader.finish()?;
        Ok(Commit::new(parents, tree_id, author, committer, message))
    }
}

fn kind_tag(kind: NodeKind) -> u8 {
    match kind {
        NodeKind::Blob => KIND_BLOB,
        NodeKind::Tree => KIND_TREE,
    }
}

fn parse_kind(tag: u8) -> CodecResult<NodeKind> {
    match tag {
        KIND_BLOB => Ok(NodeKind::Blob),
        KIND_TREE => Ok(NodeKind::Tree),
        other => Err(CodecError::InvalidKind(other)),
    }
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

fn put_i64(buf: &mut Vec<u8>, value: i64) {
    buf.extend_from_slice(&value.to_be_bytes());
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_u32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

fn put_audit(buf: &mut Vec<u8>, audit: &Audit) {
    put_str(buf, &audit.name);
    put_i64(buf, audit.ticks);
    put_i64(buf, audit.offset_ticks);
}

/// Cursor over an input slice with truncation-aware reads.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    entity: &'static str,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8], entity: &'static str) -> Self {
        Self {
            buf,
            pos: 0,
            entity,
        }
    }

    fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        let remaining = self.buf.len() - self.pos;
        if remaining < n {
            return Err(CodecError::Truncated {
                entity: self.entity,
                needed: n - remaining,
                remaining,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> CodecResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes(bytes.try_into().expect("4-byte slice")))
    }

    fn read_i64(&mut self) -> CodecResult<i64> {
        let bytes = self.take(8)?;
        Ok(i64::from_be_bytes(bytes.try_into().expect("8-byte slice")))
    }

    fn read_digest(&mut self) -> CodecResult<Digest> {
        Ok(Digest::from_bytes(self.take(DIGEST_LEN)?)?)
    }

    fn read_string(&mut self) -> CodecResult<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| CodecError::Serialization {
            entity: self.entity,
            cause: e.to_string(),
        })
    }

    fn read_audit(&mut self) -> CodecResult<Audit> {
        let name = self.read_string()?;
        let ticks = self.read_i64()?;
        let offset_ticks = self.read_i64()?;
        Ok(Audit::new(name, ticks, offset_ticks))
    }

    fn finish(&self) -> CodecResult<()> {
        let remaining = self.buf.len() - self.pos;
        if remaining != 0 {
            return Err(CodecError::TrailingBytes {
                entity: self.entity,
                remaining,
            });
        }
        Ok(())
    }
}
