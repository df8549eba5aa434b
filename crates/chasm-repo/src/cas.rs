//! The compare-and-swap decision for commit ref writes.
//!
//! Kept as a pure function so every backend enforces the same transition
//! table and only supplies its own atomic primitive (filesystem rename,
//! exclusive create, entry occupancy).

use chasm_types::{CommitId, CommitRef};

use crate::error::{ChasmError, ChasmResult};

/// The action a backend must take for a ref write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefUpdate {
    /// The ref does not exist yet; create it.
    Create,
    /// The ref matches the expected previous value; replace it.
    Replace,
    /// The ref already holds the intended value; succeed without writing.
    Noop,
}

/// Decide a ref transition.
///
/// | observed | expected previous | outcome |
/// |---|---|---|
/// | absent | absent | `Create` |
/// | absent | present | conflict |
/// | present, equals new id | any otherwise-matching | `Noop` |
/// | present, equals previous | present | `Replace` |
/// | otherwise | any | conflict |
///
/// Returns `None` on conflict; the caller attaches the namespace and branch.
pub fn decide_ref_update(
    observed: Option<&CommitId>,
    previous: Option<&CommitId>,
    new_id: &CommitId,
) -> Option<RefUpdate> {
    match observed {
        None => match previous {
            None => Some(RefUpdate::Create),
            Some(_) => None,
        },
        Some(current) if current == new_id => Some(RefUpdate::Noop),
        Some(current) => match previous {
            Some(expected) if expected == current => Some(RefUpdate::Replace),
            _ => None,
        },
    }
}

/// Validate the arguments of a ref write before any backend call.
pub fn validate_ref_write(namespace: &str, commit_ref: &CommitRef) -> ChasmResult<()> {
    require_non_blank(namespace, "namespace")?;
    require_non_blank(&commit_ref.branch, "branch")?;
    if commit_ref.commit_id.is_empty() {
        return Err(ChasmError::InvalidArgument { name: "commitId" });
    }
    Ok(())
}

/// Reject a missing or whitespace-only required string argument.
pub fn require_non_blank(value: &str, name: &'static str) -> ChasmResult<()> {
    if value.trim().is_empty() {
        return Err(ChasmError::InvalidArgument { name });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chasm_types::Digest;

    fn id(tag: &[u8]) -> CommitId {
        CommitId::new(Digest::of(tag))
    }

    #[test]
    fn absent_ref_with_no_previous_creates() {
        assert_eq!(
            decide_ref_update(None, None, &id(b"new")),
            Some(RefUpdate::Create)
        );
    }

    #[test]
    fn absent_ref_with_previous_conflicts() {
        assert_eq!(decide_ref_update(None, Some(&id(b"old")), &id(b"new")), None);
    }

    #[test]
    fn matching_previous_replaces() {
        let old = id(b"old");
        assert_eq!(
            decide_ref_update(Some(&old), Some(&old), &id(b"new")),
            Some(RefUpdate::Replace)
        );
    }

    #[test]
    fn current_already_at_new_value_is_noop() {
        let new = id(b"new");
        assert_eq!(
            decide_ref_update(Some(&new), Some(&id(b"old")), &new),
            Some(RefUpdate::Noop)
        );
        assert_eq!(decide_ref_update(Some(&new), None, &new), Some(RefUpdate::Noop));
    }

    #[test]
    fn mismatched_previous_conflicts() {
        assert_eq!(
            decide_ref_update(Some(&id(b"current")), Some(&id(b"stale")), &id(b"new")),
            None
        );
        assert_eq!(decide_ref_update(Some(&id(b"current")), None, &id(b"new")), None);
    }

    #[test]
    fn blank_arguments_rejected() {
        let commit_ref = CommitRef::new("main", id(b"c"));
        assert!(matches!(
            validate_ref_write("", &commit_ref),
            Err(ChasmError::InvalidArgument { name: "namespace" })
        ));
        assert!(matches!(
            validate_ref_write("  ", &commit_ref),
            Err(ChasmError::InvalidArgument { name: "namespace" })
        ));
        let blank_branch = CommitRef::new("   ", id(b"c"));
        assert!(matches!(
            validate_ref_write("repo", &blank_branch),
            Err(ChasmError::InvalidArgument { name: "branch" })
        ));
    }

    #[test]
    fn empty_commit_id_rejected() {
        let empty = CommitRef::new("main", CommitId::EMPTY);
        assert!(matches!(
            validate_ref_write("repo", &empty),
            Err(ChasmError::InvalidArgument { name: "commitId" })
        ));
    }
}
