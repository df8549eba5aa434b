use std::collections::HashMap;
use std::io::Write as _;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use chasm_codec::Serializer;
use chasm_types::{
    Audit, BlobMetadata, ChasmBlob, ChasmStream, Commit, CommitId, CommitRef, Digest,
    RequestContext, TreeId, TreeNodeMap, WriteResult,
};

use crate::cas::require_non_blank;
use crate::config::RepoConfig;
use crate::error::{ChasmError, ChasmResult};

/// A caller-supplied producer run against the backend's hashing sink.
///
/// Whatever the producer writes (not its pre-transform input) defines the
/// digest of the stored object.
pub type PayloadProducer = Box<dyn FnOnce(&mut dyn std::io::Write) -> std::io::Result<()> + Send>;

/// The repository contract over objects, trees, commits, and commit refs.
///
/// Backends implement the primitives; the default layer derives tree, commit,
/// and batch operations from them. A backend overrides a derived method only
/// when it can optimise it (e.g. a streaming `write_stream`).
///
/// Reads of absent entities return `None` or omit the entry from batch
/// results; absence is never an error.
#[async_trait]
pub trait Repository: Send + Sync {
    /// The codec this repository was built with.
    ///
    /// The codec identity is part of the store's persistent format and must
    /// not change for an existing store.
    fn codec(&self) -> &dyn Serializer;

    /// Construction-time configuration.
    fn config(&self) -> &RepoConfig;

    /// Request annotations propagated to backends that support them.
    fn context(&self) -> &RequestContext;

    // ---- object primitives ----

    /// Check whether an object exists.
    async fn exists(&self, digest: &Digest, cancel: &CancellationToken) -> ChasmResult<bool>;

    /// Read an object fully into memory, with its metadata when present.
    async fn read(
        &self,
        digest: &Digest,
        cancel: &CancellationToken,
    ) -> ChasmResult<Option<ChasmBlob>>;

    /// Read an object as a lazy byte stream.
    async fn read_stream(
        &self,
        digest: &Digest,
        cancel: &CancellationToken,
    ) -> ChasmResult<Option<ChasmStream>>;

    /// Write an object by running `producer` against the hashing sink.
    ///
    /// The digest of the produced bytes is the object's address. When an
    /// object with that digest already exists the write is a no-op reporting
    /// `created: false`, unless `force` is set, in which case the object is
    /// replaced.
    async fn write_with(
        &self,
        producer: PayloadProducer,
        metadata: Option<BlobMetadata>,
        force: bool,
        cancel: &CancellationToken,
    ) -> ChasmResult<WriteResult<Digest>>;

    // ---- commit ref primitives ----

    /// Enumerate ref namespaces.
    async fn list_names(&self, cancel: &CancellationToken) -> ChasmResult<Vec<String>>;

    /// Enumerate the branches under one namespace.
    async fn list_branches(
        &self,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> ChasmResult<Vec<CommitRef>>;

    /// Read the ref for a branch.
    async fn read_commit_ref(
        &self,
        namespace: &str,
        branch: &str,
        cancel: &CancellationToken,
    ) -> ChasmResult<Option<CommitRef>>;

    /// Advance a branch ref with compare-and-swap semantics.
    ///
    /// `previous` is the commit id the caller expects the ref to hold, or
    /// `None` when the caller believes the ref does not exist yet. A mismatch
    /// with the observed state fails with [`ChasmError::Conflict`]; writing
    /// the value the ref already holds is an idempotent success.
    async fn write_commit_ref(
        &self,
        previous: Option<&CommitId>,
        namespace: &str,
        commit_ref: &CommitRef,
        cancel: &CancellationToken,
    ) -> ChasmResult<()>;

    // ---- derived object operations ----

    /// Write a byte buffer as an object.
    async fn write(
        &self,
        bytes: &[u8],
        metadata: Option<BlobMetadata>,
        force: bool,
        cancel: &CancellationToken,
    ) -> ChasmResult<WriteResult<Digest>> {
        let owned = bytes.to_vec();
        self.write_with(
            Box::new(move |sink| sink.write_all(&owned)),
            metadata,
            force,
            cancel,
        )
        .await
    }

    /// Write an async byte stream as an object.
    ///
    /// The default buffers the stream; backends with a streaming pipeline
    /// override this.
    async fn write_stream(
        &self,
        mut reader: Box<dyn AsyncRead + Send + Unpin>,
        metadata: Option<BlobMetadata>,
        force: bool,
        cancel: &CancellationToken,
    ) -> ChasmResult<WriteResult<Digest>> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        if cancel.is_cancelled() {
            return Err(ChasmError::Cancelled);
        }
        self.write(&buf, metadata, force, cancel).await
    }

    /// Read many objects; absent digests are omitted from the result.
    ///
    /// Fans out to [`Repository::read`] with the configured degree of
    /// parallelism. Empty input makes no backend calls. All children run to
    /// completion; the first failure is reported after the batch drains.
    async fn read_batch(
        &self,
        digests: &[Digest],
        cancel: &CancellationToken,
    ) -> ChasmResult<HashMap<Digest, ChasmBlob>> {
        if digests.is_empty() {
            return Ok(HashMap::new());
        }
        let mut unique = digests.to_vec();
        unique.sort_unstable();
        unique.dedup();
        let dop = self.config().effective_dop(unique.len());
        let outcomes: Vec<ChasmResult<(Digest, Option<ChasmBlob>)>> =
            stream::iter(unique.into_iter().map(|digest| async move {
                let blob = self.read(&digest, cancel).await?;
                Ok((digest, blob))
            }))
            .buffer_unordered(dop)
            .collect()
            .await;

        let mut found = HashMap::new();
        let mut first_failure = None;
        for outcome in outcomes {
            match outcome {
                Ok((digest, Some(blob))) => {
                    found.insert(digest, blob);
                }
                Ok((_, None)) => {}
                Err(e) if first_failure.is_none() => first_failure = Some(e),
                Err(_) => {}
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(found),
        }
    }

    /// Write many blobs, preserving input order in the results.
    ///
    /// Completed sibling writes are not rolled back when one child fails;
    /// callers needing atomicity sequence their writes through commits.
    async fn write_batch(
        &self,
        blobs: Vec<ChasmBlob>,
        force: bool,
        cancel: &CancellationToken,
    ) -> ChasmResult<Vec<WriteResult<Digest>>> {
        if blobs.is_empty() {
            return Ok(Vec::new());
        }
        let dop = self.config().effective_dop(blobs.len());
        let mut outcomes: Vec<(usize, ChasmResult<WriteResult<Digest>>)> =
            stream::iter(blobs.into_iter().enumerate().map(|(index, blob)| async move {
                let result = self
                    .write(&blob.bytes, blob.metadata.clone(), force, cancel)
                    .await;
                (index, result)
            }))
            .buffer_unordered(dop)
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _)| *index);

        let mut results = Vec::with_capacity(outcomes.len());
        for (_, outcome) in outcomes {
            results.push(outcome?);
        }
        Ok(results)
    }

    // ---- derived tree operations ----

    /// Read a tree by its id. Absent object yields `None`.
    async fn read_tree(
        &self,
        tree_id: &TreeId,
        cancel: &CancellationToken,
    ) -> ChasmResult<Option<TreeNodeMap>> {
        match self.read(&tree_id.digest(), cancel).await? {
            None => Ok(None),
            Some(blob) => Ok(Some(self.codec().deserialize_tree(&blob.bytes)?)),
        }
    }

    /// Read the tree a commit captures.
    async fn read_tree_for_commit(
        &self,
        commit_id: &CommitId,
        cancel: &CancellationToken,
    ) -> ChasmResult<Option<TreeNodeMap>> {
        match self.read_commit(commit_id, cancel).await? {
            None => Ok(None),
            Some(commit) => self.read_tree(&commit.tree_id, cancel).await,
        }
    }

    /// Resolve a branch to its commit, then read that commit's tree.
    async fn read_tree_at_branch(
        &self,
        namespace: &str,
        branch: &str,
        cancel: &CancellationToken,
    ) -> ChasmResult<Option<TreeNodeMap>> {
        require_non_blank(namespace, "namespace")?;
        require_non_blank(branch, "branch")?;
        match self.read_commit_ref(namespace, branch, cancel).await? {
            None => Ok(None),
            Some(commit_ref) => self.read_tree_for_commit(&commit_ref.commit_id, cancel).await,
        }
    }

    /// Read many trees; absent ids are omitted from the result.
    async fn read_tree_batch(
        &self,
        tree_ids: &[TreeId],
        cancel: &CancellationToken,
    ) -> ChasmResult<HashMap<TreeId, TreeNodeMap>> {
        if tree_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut unique = tree_ids.to_vec();
        unique.sort_unstable();
        unique.dedup();
        let dop = self.config().effective_dop(unique.len());
        let outcomes: Vec<ChasmResult<(TreeId, Option<TreeNodeMap>)>> =
            stream::iter(unique.into_iter().map(|tree_id| async move {
                let tree = self.read_tree(&tree_id, cancel).await?;
                Ok((tree_id, tree))
            }))
            .buffer_unordered(dop)
            .collect()
            .await;

        let mut found = HashMap::new();
        let mut first_failure = None;
        for outcome in outcomes {
            match outcome {
                Ok((tree_id, Some(tree))) => {
                    found.insert(tree_id, tree);
                }
                Ok((_, None)) => {}
                Err(e) if first_failure.is_none() => first_failure = Some(e),
                Err(_) => {}
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(found),
        }
    }

    /// Serialize and write a tree, returning its address.
    async fn write_tree(
        &self,
        tree: &TreeNodeMap,
        cancel: &CancellationToken,
    ) -> ChasmResult<TreeId> {
        let bytes = self.codec().serialize_tree(tree)?;
        let result = self.write(&bytes, None, false, cancel).await?;
        Ok(TreeId::new(result.id))
    }

    /// Write a tree, then bind it into a new commit.
    async fn commit_tree(
        &self,
        parents: Vec<CommitId>,
        tree: &TreeNodeMap,
        author: Audit,
        committer: Audit,
        message: Option<String>,
        cancel: &CancellationToken,
    ) -> ChasmResult<CommitId> {
        let tree_id = self.write_tree(tree, cancel).await?;
        let commit = Commit::new(parents, tree_id, author, committer, message);
        self.write_commit(&commit, cancel).await
    }

    // ---- derived commit operations ----

    /// Read a commit by its id. Absent object yields `None`.
    async fn read_commit(
        &self,
        commit_id: &CommitId,
        cancel: &CancellationToken,
    ) -> ChasmResult<Option<Commit>> {
        match self.read(&commit_id.digest(), cancel).await? {
            None => Ok(None),
            Some(blob) => Ok(Some(self.codec().deserialize_commit(&blob.bytes)?)),
        }
    }

    /// Serialize and write a commit, returning its address.
    async fn write_commit(
        &self,
        commit: &Commit,
        cancel: &CancellationToken,
    ) -> ChasmResult<CommitId> {
        let bytes = self.codec().serialize_commit(commit)?;
        let result = self.write(&bytes, None, false, cancel).await?;
        Ok(CommitId::new(result.id))
    }
}
