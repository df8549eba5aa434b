use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::error::TreeError;

/// The kind of object a tree node points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Leaf object (raw content).
    Blob,
    /// Subtree.
    Tree,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Tree => write!(f, "tree"),
        }
    }
}

/// A single entry in a tree: a name bound to the address of a blob or subtree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Entry name, unique within its containing map.
    pub name: String,
    /// Whether the target is a leaf or a subtree.
    pub kind: NodeKind,
    /// Content address of the target object.
    pub target: Digest,
}

impl TreeNode {
    /// Create a new tree node.
    pub fn new(name: impl Into<String>, kind: NodeKind, target: Digest) -> Self {
        Self {
            name: name.into(),
            kind,
            target,
        }
    }
}

/// An immutable directory listing: tree nodes sorted ascending by name.
///
/// Names are compared byte-wise and must be unique and non-empty. The map is
/// the in-memory form of a tree object; serializing and deserializing it
/// yields an equal value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeNodeMap {
    nodes: Vec<TreeNode>,
}

impl TreeNodeMap {
    /// Build a map from nodes, sorting by name.
    ///
    /// Rejects empty names and duplicate names.
    pub fn new(mut nodes: Vec<TreeNode>) -> Result<Self, TreeError> {
        if nodes.iter().any(|n| n.name.is_empty()) {
            return Err(TreeError::EmptyNodeName);
        }
        nodes.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        for pair in nodes.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(TreeError::DuplicateName {
                    name: pair[1].name.clone(),
                });
            }
        }
        Ok(Self { nodes })
    }

    /// The empty map.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Nodes in ascending name order.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Look up a node by name.
    pub fn get(&self, name: &str) -> Option<&TreeNode> {
        self.nodes
            .binary_search_by(|n| n.name.as_bytes().cmp(name.as_bytes()))
            .ok()
            .map(|i| &self.nodes[i])
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the map has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TreeNode> {
        self.nodes.iter()
    }
}

impl<'a> IntoIterator for &'a TreeNodeMap {
    type Item = &'a TreeNode;
    type IntoIter = std::slice::Iter<'a, TreeNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> TreeNode {
        TreeNode::new(name, NodeKind::Blob, Digest::of(name.as_bytes()))
    }

    #[test]
    fn nodes_are_sorted_by_name() {
        let map = TreeNodeMap::new(vec![node("zebra"), node("alpha"), node("middle")]).unwrap();
        let names: Vec<_> = map.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["alpha", "middle", "zebra"]);
    }

    #[test]
    fn ordering_is_byte_wise() {
        // 'Z' (0x5a) sorts before 'a' (0x61) under ordinal comparison.
        let map = TreeNodeMap::new(vec![node("a"), node("Z")]).unwrap();
        let names: Vec<_> = map.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["Z", "a"]);
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = TreeNodeMap::new(vec![node("a"), node("a")]).unwrap_err();
        assert_eq!(
            err,
            TreeError::DuplicateName {
                name: "a".to_string()
            }
        );
    }

    #[test]
    fn empty_names_rejected() {
        let err = TreeNodeMap::new(vec![node("")]).unwrap_err();
        assert_eq!(err, TreeError::EmptyNodeName);
    }

    #[test]
    fn empty_map_singleton() {
        let map = TreeNodeMap::empty();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
        assert_eq!(map, TreeNodeMap::new(vec![]).unwrap());
    }

    #[test]
    fn get_finds_by_name() {
        let map = TreeNodeMap::new(vec![node("a"), node("b"), node("c")]).unwrap();
        assert_eq!(map.get("b").unwrap().name, "b");
        assert!(map.get("missing").is_none());
    }

    #[test]
    fn kind_display() {
        assert_eq!(format!("{}", NodeKind::Blob), "blob");
        assert_eq!(format!("{}", NodeKind::Tree), "tree");
    }
}
