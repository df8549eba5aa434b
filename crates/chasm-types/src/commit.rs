use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::id::{CommitId, TreeId};

/// Ticks per second (one tick is 100 ns).
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Authorship record attached to a commit.
///
/// The timestamp is kept as raw integers: ticks (100 ns units) since the Unix
/// epoch, plus the local UTC offset in ticks. Keeping both components means a
/// commit records the wall clock the author actually saw.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    /// Author or committer name. May be empty.
    pub name: String,
    /// Ticks since the Unix epoch.
    pub ticks: i64,
    /// Offset from UTC in ticks.
    pub offset_ticks: i64,
}

impl Audit {
    /// Create an audit with explicit values.
    pub fn new(name: impl Into<String>, ticks: i64, offset_ticks: i64) -> Self {
        Self {
            name: name.into(),
            ticks,
            offset_ticks,
        }
    }

    /// Capture the current wall clock with a zero UTC offset.
    pub fn now(name: impl Into<String>) -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let ticks = since_epoch.as_secs() as i64 * TICKS_PER_SECOND
            + (since_epoch.subsec_nanos() / 100) as i64;
        Self {
            name: name.into(),
            ticks,
            offset_ticks: 0,
        }
    }
}

/// An immutable record binding a tree to zero or more parent commits.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    /// Parent commits, in order. Empty for a root commit.
    pub parents: Vec<CommitId>,
    /// The tree this commit captures. May be the empty id.
    pub tree_id: TreeId,
    /// Who authored the change.
    pub author: Audit,
    /// Who recorded the commit.
    pub committer: Audit,
    /// Optional commit message.
    pub message: Option<String>,
}

impl Commit {
    /// Create a commit record.
    pub fn new(
        parents: Vec<CommitId>,
        tree_id: TreeId,
        author: Audit,
        committer: Audit,
        message: Option<String>,
    ) -> Self {
        Self {
            parents,
            tree_id,
            author,
            committer,
            message,
        }
    }
}

/// A branch name paired with the commit id it points to.
///
/// Scoped under a namespace (the containing logical repository).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRef {
    /// Branch name. Must be non-empty.
    pub branch: String,
    /// The commit the branch points at.
    pub commit_id: CommitId,
}

impl CommitRef {
    /// Create a commit ref.
    pub fn new(branch: impl Into<String>, commit_id: CommitId) -> Self {
        Self {
            branch: branch.into(),
            commit_id,
        }
    }
}
