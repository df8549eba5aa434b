//! The disk-backed repository.

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sha1::{Digest as _, Sha1};
use tempfile::{NamedTempFile, TempPath};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use chasm_codec::Serializer;
use chasm_repo::{
    decide_ref_update, require_non_blank, validate_ref_write, ChasmError, ChasmResult,
    PayloadProducer, RefUpdate, RepoConfig, Repository,
};
use chasm_types::{
    BlobMetadata, ChasmBlob, ChasmStream, CommitId, CommitRef, Digest, RequestContext,
    WriteResult,
};

use crate::paths;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::sink::HashingWriter;

/// A [`Repository`] storing objects and refs under a root directory.
///
/// Directories are created lazily on first write; opening a repository does
/// no I/O.
pub struct DiskRepository {
    root: PathBuf,
    codec: Arc<dyn Serializer>,
    config: RepoConfig,
    context: RequestContext,
    retry: RetryPolicy,
}

impl DiskRepository {
    /// Open a repository at `root` with default configuration.
    pub fn open(root: impl Into<PathBuf>, codec: Arc<dyn Serializer>) -> Self {
        Self::with_config(
            root,
            codec,
            RepoConfig::default(),
            RetryPolicy::default(),
            RequestContext::default(),
        )
    }

    /// Open a repository with explicit configuration.
    pub fn with_config(
        root: impl Into<PathBuf>,
        codec: Arc<dyn Serializer>,
        config: RepoConfig,
        retry: RetryPolicy,
        context: RequestContext,
    ) -> Self {
        Self {
            root: root.into(),
            codec,
            config,
            context,
            retry,
        }
    }

    /// The root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, digest: &Digest) -> PathBuf {
        paths::object_path(&self.root, digest, self.config.prefix_len)
    }
}

fn join_error(e: task::JoinError) -> ChasmError {
    ChasmError::Backend(format!("blocking task failed: {e}"))
}

fn read_metadata(object_path: &Path) -> ChasmResult<Option<BlobMetadata>> {
    match fs::read(paths::metadata_path(object_path)) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ChasmError::Backend(format!("malformed metadata sidecar: {e}"))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_metadata(object_path: &Path, metadata: &BlobMetadata) -> ChasmResult<()> {
    let bytes = serde_json::to_vec(metadata)
        .map_err(|e| ChasmError::Backend(format!("failed to encode metadata sidecar: {e}")))?;
    fs::write(paths::metadata_path(object_path), bytes)?;
    Ok(())
}

/// Move a fully written temp file into its sharded address.
///
/// The temp file is deleted on every path that does not rename it into
/// place (the `TempPath` drop guard owns that).
fn publish_temp(
    temp_path: TempPath,
    root: &Path,
    digest: Digest,
    prefix_len: usize,
    metadata: Option<&BlobMetadata>,
    force: bool,
) -> ChasmResult<WriteResult<Digest>> {
    let target = paths::object_path(root, &digest, prefix_len);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let created;
    let mut persisted = false;
    if force {
        let replaced = fs::remove_file(&target).is_ok();
        temp_path
            .persist(&target)
            .map_err(|e| ChasmError::Io(e.error))?;
        created = !replaced;
        persisted = true;
    } else if target.exists() {
        created = false;
    } else {
        match temp_path.persist_noclobber(&target) {
            Ok(()) => {
                created = true;
                persisted = true;
            }
            // A concurrent writer of the same content won the rename; this
            // call still succeeded, it just did not materialize the object.
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => created = false,
            Err(e) => return Err(ChasmError::Io(e.error)),
        }
    }

    if persisted {
        if let Some(md) = metadata {
            write_metadata(&target, md)?;
        }
    }
    debug!(digest = %digest, created, "stored object");
    Ok(WriteResult::new(digest, created))
}

#[async_trait]
impl Repository for DiskRepository {
    fn codec(&self) -> &dyn Serializer {
        &*self.codec
    }

    fn config(&self) -> &RepoConfig {
        &self.config
    }

    fn context(&self) -> &RequestContext {
        &self.context
    }

    async fn exists(&self, digest: &Digest, cancel: &CancellationToken) -> ChasmResult<bool> {
        if cancel.is_cancelled() {
            return Err(ChasmError::Cancelled);
        }
        let path = self.object_path(digest);
        task::spawn_blocking(move || path.exists())
            .await
            .map_err(join_error)
    }

    async fn read(
        &self,
        digest: &Digest,
        cancel: &CancellationToken,
    ) -> ChasmResult<Option<ChasmBlob>> {
        let path = self.object_path(digest);
        let policy = self.retry;
        let cancel = cancel.clone();
        task::spawn_blocking(move || {
            let bytes = match run_with_retry(&policy, &cancel, || fs::read(&path)) {
                Ok(bytes) => bytes,
                Err(ChasmError::Io(e)) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e),
            };
            let metadata = read_metadata(&path)?;
            Ok(Some(ChasmBlob::new(bytes, metadata)))
        })
        .await
        .map_err(join_error)?
    }

    async fn read_stream(
        &self,
        digest: &Digest,
        cancel: &CancellationToken,
    ) -> ChasmResult<Option<ChasmStream>> {
        let path = self.object_path(digest);
        let policy = self.retry;
        let cancel = cancel.clone();
        let opened = task::spawn_blocking(move || {
            let file = match run_with_retry(&policy, &cancel, || fs::File::open(&path)) {
                Ok(file) => file,
                Err(ChasmError::Io(e)) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e),
            };
            let metadata = read_metadata(&path)?;
            Ok(Some((file, metadata)))
        })
        .await
        .map_err(join_error)??;
        Ok(opened.map(|(file, metadata)| {
            ChasmStream::new(Box::new(tokio::fs::File::from_std(file)), metadata)
        }))
    }

    async fn write_with(
        &self,
        producer: PayloadProducer,
        metadata: Option<BlobMetadata>,
        force: bool,
        cancel: &CancellationToken,
    ) -> ChasmResult<WriteResult<Digest>> {
        if cancel.is_cancelled() {
            return Err(ChasmError::Cancelled);
        }
        let root = self.root.clone();
        let prefix_len = self.config.prefix_len;
        let cancel = cancel.clone();
        task::spawn_blocking(move || {
            let temp = NamedTempFile::new()?;
            let (file, temp_path) = temp.into_parts();
            let mut sink = HashingWriter::new(BufWriter::new(file));
            producer(&mut sink)?;
            sink.flush()?;
            let (writer, digest) = sink.finish();
            drop(writer.into_inner().map_err(|e| ChasmError::Io(e.into_error()))?);
            if cancel.is_cancelled() {
                // temp_path drops here and removes the scratch file.
                return Err(ChasmError::Cancelled);
            }
            publish_temp(temp_path, &root, digest, prefix_len, metadata.as_ref(), force)
        })
        .await
        .map_err(join_error)?
    }

    async fn write_stream(
        &self,
        mut reader: Box<dyn AsyncRead + Send + Unpin>,
        metadata: Option<BlobMetadata>,
        force: bool,
        cancel: &CancellationToken,
    ) -> ChasmResult<WriteResult<Digest>> {
        if cancel.is_cancelled() {
            return Err(ChasmError::Cancelled);
        }
        let temp = task::spawn_blocking(NamedTempFile::new)
            .await
            .map_err(join_error)??;
        let (file, temp_path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        let mut hasher = Sha1::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            if cancel.is_cancelled() {
                return Err(ChasmError::Cancelled);
            }
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n]).await?;
        }
        file.flush().await?;
        drop(file);
        let digest = Digest::from_raw(hasher.finalize().into());

        let root = self.root.clone();
        let prefix_len = self.config.prefix_len;
        task::spawn_blocking(move || {
            publish_temp(temp_path, &root, digest, prefix_len, metadata.as_ref(), force)
        })
        .await
        .map_err(join_error)?
    }

    async fn list_names(&self, cancel: &CancellationToken) -> ChasmResult<Vec<String>> {
        if cancel.is_cancelled() {
            return Err(ChasmError::Cancelled);
        }
        let dir = self.root.join(paths::REFS_DIR);
        task::spawn_blocking(move || {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };
            let mut names = Vec::new();
            for entry in entries {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                let file_name = entry.file_name();
                if let Some(name) = file_name.to_str().and_then(paths::unescape_segment) {
                    names.push(name);
                }
            }
            names.sort();
            Ok(names)
        })
        .await
        .map_err(join_error)?
    }

    async fn list_branches(
        &self,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> ChasmResult<Vec<CommitRef>> {
        require_non_blank(namespace, "namespace")?;
        if cancel.is_cancelled() {
            return Err(ChasmError::Cancelled);
        }
        let dir = paths::namespace_dir(&self.root, namespace);
        let codec = Arc::clone(&self.codec);
        let policy = self.retry;
        let cancel = cancel.clone();
        task::spawn_blocking(move || {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };
            let mut branches = Vec::new();
            for entry in entries {
                let entry = entry?;
                let file_name = entry.file_name();
                let Some(name) = file_name.to_str() else {
                    continue;
                };
                let Some(stem) = name.strip_suffix(paths::REF_SUFFIX) else {
                    continue;
                };
                let Some(branch) = paths::unescape_segment(stem) else {
                    continue;
                };
                let bytes = run_with_retry(&policy, &cancel, || fs::read(entry.path()))?;
                let commit_id = codec.deserialize_commit_id(&bytes)?;
                branches.push(CommitRef::new(branch, commit_id));
            }
            branches.sort_by(|a, b| a.branch.cmp(&b.branch));
            Ok(branches)
        })
        .await
        .map_err(join_error)?
    }

    async fn read_commit_ref(
        &self,
        namespace: &str,
        branch: &str,
        cancel: &CancellationToken,
    ) -> ChasmResult<Option<CommitRef>> {
        require_non_blank(namespace, "namespace")?;
        require_non_blank(branch, "branch")?;
        let path = paths::ref_path(&self.root, namespace, branch);
        let policy = self.retry;
        let cancel = cancel.clone();
        let bytes = task::spawn_blocking(move || {
            match run_with_retry(&policy, &cancel, || fs::read(&path)) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(ChasmError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(join_error)??;
        match bytes {
            None => Ok(None),
            Some(bytes) => {
                let commit_id = self.codec.deserialize_commit_id(&bytes)?;
                Ok(Some(CommitRef::new(branch, commit_id)))
            }
        }
    }

    async fn write_commit_ref(
        &self,
        previous: Option<&CommitId>,
        namespace: &str,
        commit_ref: &CommitRef,
        cancel: &CancellationToken,
    ) -> ChasmResult<()> {
        validate_ref_write(namespace, commit_ref)?;
        if cancel.is_cancelled() {
            return Err(ChasmError::Cancelled);
        }
        let payload = self.codec.serialize_commit_id(&commit_ref.commit_id)?;
        let path = paths::ref_path(&self.root, namespace, &commit_ref.branch);
        let codec = Arc::clone(&self.codec);
        let policy = self.retry;
        let cancel = cancel.clone();
        let previous = previous.copied();
        let namespace = namespace.to_string();
        let branch = commit_ref.branch.clone();
        let new_id = commit_ref.commit_id;
        task::spawn_blocking(move || {
            let conflict = || ChasmError::Conflict {
                namespace: namespace.clone(),
                branch: branch.clone(),
            };
            let dir = path
                .parent()
                .ok_or_else(|| ChasmError::Backend("ref path has no parent directory".into()))?;
            fs::create_dir_all(dir)?;

            let observed = match run_with_retry(&policy, &cancel, || fs::read(&path)) {
                Ok(bytes) => Some(codec.deserialize_commit_id(&bytes)?),
                Err(ChasmError::Io(e)) if e.kind() == io::ErrorKind::NotFound => None,
                Err(e) => return Err(e),
            };

            match decide_ref_update(observed.as_ref(), previous.as_ref(), &new_id) {
                None => return Err(conflict()),
                Some(RefUpdate::Noop) => return Ok(()),
                Some(RefUpdate::Create) => {
                    // Exclusive create is the atomic primitive for first
                    // writes: the loser of a race observes AlreadyExists.
                    let mut file =
                        match OpenOptions::new().write(true).create_new(true).open(&path) {
                            Ok(file) => file,
                            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                                return Err(conflict())
                            }
                            Err(e) => return Err(e.into()),
                        };
                    file.write_all(&payload)?;
                    file.sync_all()?;
                }
                Some(RefUpdate::Replace) => {
                    let mut temp = NamedTempFile::new_in(dir)?;
                    temp.write_all(&payload)?;
                    temp.as_file().sync_all()?;
                    temp.persist(&path).map_err(|e| ChasmError::Io(e.error))?;
                }
            }
            debug!(
                namespace = %namespace,
                branch = %branch,
                commit = %new_id,
                "advanced commit ref"
            );
            Ok(())
        })
        .await
        .map_err(join_error)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{Cursor, Write as _};

    use tempfile::{tempdir, TempDir};

    use chasm_codec::{BinaryCodec, JsonCodec};
    use chasm_types::{Audit, NodeKind, TreeId, TreeNode, TreeNodeMap};

    fn repo() -> (TempDir, DiskRepository) {
        let dir = tempdir().unwrap();
        let repo = DiskRepository::open(dir.path(), Arc::new(BinaryCodec::new()));
        (dir, repo)
    }

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    fn sample_tree() -> TreeNodeMap {
        TreeNodeMap::new(vec![
            TreeNode::new("a", NodeKind::Blob, Digest::of(b"d1")),
            TreeNode::new("b", NodeKind::Tree, Digest::of(b"d2")),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn write_read_blob() {
        let (_dir, repo) = repo();
        let cancel = token();

        let result = repo.write(b"abc", None, false, &cancel).await.unwrap();
        assert!(result.created);
        assert_eq!(result.id.to_hex(), "a9993e364706816aba3e25717850c26c9cd0d89d");

        let blob = repo.read(&result.id, &cancel).await.unwrap().unwrap();
        assert_eq!(blob.bytes, b"abc");
        assert!(repo.exists(&result.id, &cancel).await.unwrap());

        // The object landed at its sharded path.
        let expected = repo
            .root()
            .join("objects")
            .join("a999")
            .join("3e364706816aba3e25717850c26c9cd0d89d");
        assert!(expected.is_file());
    }

    #[tokio::test]
    async fn idempotent_write() {
        let (_dir, repo) = repo();
        let cancel = token();

        let first = repo.write(b"abc", None, false, &cancel).await.unwrap();
        let second = repo.write(b"abc", None, false, &cancel).await.unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);

        let blob = repo.read(&first.id, &cancel).await.unwrap().unwrap();
        assert_eq!(blob.bytes, b"abc");
    }

    #[tokio::test]
    async fn force_overwrite_replaces_object() {
        let (_dir, repo) = repo();
        let cancel = token();

        repo.write(b"abc", None, false, &cancel).await.unwrap();
        let metadata = BlobMetadata::new(Some("text/plain".into()), Some("abc.txt".into()));
        let result = repo
            .write(b"abc", Some(metadata.clone()), true, &cancel)
            .await
            .unwrap();
        assert!(!result.created);

        let blob = repo.read(&result.id, &cancel).await.unwrap().unwrap();
        assert_eq!(blob.bytes, b"abc");
        assert_eq!(blob.metadata, Some(metadata));
    }

    #[tokio::test]
    async fn read_absent_returns_none() {
        let (_dir, repo) = repo();
        let cancel = token();
        let missing = Digest::of(b"never stored");

        assert!(repo.read(&missing, &cancel).await.unwrap().is_none());
        assert!(repo.read_stream(&missing, &cancel).await.unwrap().is_none());
        assert!(!repo.exists(&missing, &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn metadata_sidecar_roundtrip() {
        let (_dir, repo) = repo();
        let cancel = token();
        let metadata = BlobMetadata::new(Some("application/json".into()), Some("x.json".into()));

        let result = repo
            .write(b"{}", Some(metadata.clone()), false, &cancel)
            .await
            .unwrap();
        let sidecar = paths::metadata_path(&repo.object_path(&result.id));
        assert!(sidecar.is_file());

        let blob = repo.read(&result.id, &cancel).await.unwrap().unwrap();
        assert_eq!(blob.metadata, Some(metadata.clone()));

        let stream = repo.read_stream(&result.id, &cancel).await.unwrap().unwrap();
        assert_eq!(stream.metadata, Some(metadata.clone()));

        let batch = repo.read_batch(&[result.id], &cancel).await.unwrap();
        assert_eq!(batch[&result.id].metadata, Some(metadata));
    }

    #[tokio::test]
    async fn stream_write_and_read() {
        let (_dir, repo) = repo();
        let cancel = token();
        let payload = vec![7u8; 200_000];

        let reader = Box::new(Cursor::new(payload.clone()));
        let result = repo.write_stream(reader, None, false, &cancel).await.unwrap();
        assert!(result.created);
        assert_eq!(result.id, Digest::of(&payload));

        let mut stream = repo.read_stream(&result.id, &cancel).await.unwrap().unwrap();
        let mut read_back = Vec::new();
        stream.reader.read_to_end(&mut read_back).await.unwrap();
        assert_eq!(read_back, payload);
    }

    #[tokio::test]
    async fn producer_output_defines_digest() {
        let (_dir, repo) = repo();
        let cancel = token();

        let result = repo
            .write_with(
                Box::new(|sink| {
                    for chunk in [b"ab".as_slice(), b"c"] {
                        sink.write_all(chunk)?;
                    }
                    Ok(())
                }),
                None,
                false,
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(result.id.to_hex(), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[tokio::test]
    async fn tree_roundtrip() {
        let (_dir, repo) = repo();
        let cancel = token();
        let tree = sample_tree();

        let tree_id = repo.write_tree(&tree, &cancel).await.unwrap();
        let read = repo.read_tree(&tree_id, &cancel).await.unwrap().unwrap();
        assert_eq!(read, tree);
        let names: Vec<_> = read.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[tokio::test]
    async fn read_tree_on_absent_digest_is_none() {
        let (_dir, repo) = repo();
        let cancel = token();
        let missing = TreeId::new(Digest::of(b"missing tree"));
        assert!(repo.read_tree(&missing, &cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commit_chain() {
        let (_dir, repo) = repo();
        let cancel = token();
        let author = Audit::new("alice", 100, 0);
        let committer = Audit::new("bob", 200, 0);

        let t0 = TreeNodeMap::new(vec![TreeNode::new("f", NodeKind::Blob, Digest::of(b"v0"))])
            .unwrap();
        let c0 = repo
            .commit_tree(
                vec![],
                &t0,
                author.clone(),
                committer.clone(),
                Some("init".into()),
                &cancel,
            )
            .await
            .unwrap();

        let t1 = TreeNodeMap::new(vec![TreeNode::new("f", NodeKind::Blob, Digest::of(b"v1"))])
            .unwrap();
        let c1 = repo
            .commit_tree(
                vec![c0],
                &t1,
                author,
                committer,
                Some("next".into()),
                &cancel,
            )
            .await
            .unwrap();

        let commit = repo.read_commit(&c1, &cancel).await.unwrap().unwrap();
        assert_eq!(commit.parents, vec![c0]);
        assert_eq!(commit.message.as_deref(), Some("next"));
        let tree = repo.read_tree_for_commit(&c1, &cancel).await.unwrap().unwrap();
        assert_eq!(tree, t1);
    }

    #[tokio::test]
    async fn ref_cas_happy_path() {
        let (_dir, repo) = repo();
        let cancel = token();
        let c0 = CommitId::new(Digest::of(b"c0"));
        let c1 = CommitId::new(Digest::of(b"c1"));

        repo.write_commit_ref(None, "repo", &CommitRef::new("main", c0), &cancel)
            .await
            .unwrap();
        let read = repo
            .read_commit_ref("repo", "main", &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.commit_id, c0);

        repo.write_commit_ref(Some(&c0), "repo", &CommitRef::new("main", c1), &cancel)
            .await
            .unwrap();
        let read = repo
            .read_commit_ref("repo", "main", &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.commit_id, c1);
    }

    #[tokio::test]
    async fn ref_cas_conflict() {
        let (_dir, repo) = repo();
        let cancel = token();
        let c0 = CommitId::new(Digest::of(b"c0"));
        let c1 = CommitId::new(Digest::of(b"c1"));
        let c2 = CommitId::new(Digest::of(b"c2"));

        repo.write_commit_ref(None, "repo", &CommitRef::new("main", c0), &cancel)
            .await
            .unwrap();
        repo.write_commit_ref(Some(&c0), "repo", &CommitRef::new("main", c1), &cancel)
            .await
            .unwrap();

        let err = repo
            .write_commit_ref(Some(&c0), "repo", &CommitRef::new("main", c2), &cancel)
            .await
            .unwrap_err();
        match err {
            ChasmError::Conflict { namespace, branch } => {
                assert_eq!(namespace, "repo");
                assert_eq!(branch, "main");
            }
            other => panic!("expected conflict, got {other}"),
        }

        let read = repo
            .read_commit_ref("repo", "main", &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.commit_id, c1);
    }

    #[tokio::test]
    async fn ref_create_with_stale_previous_conflicts() {
        let (_dir, repo) = repo();
        let cancel = token();
        let c0 = CommitId::new(Digest::of(b"c0"));

        let err = repo
            .write_commit_ref(Some(&c0), "repo", &CommitRef::new("main", c0), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ChasmError::Conflict { .. }));
        assert!(repo
            .read_commit_ref("repo", "main", &cancel)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn ref_rewrite_of_current_value_is_noop() {
        let (_dir, repo) = repo();
        let cancel = token();
        let c0 = CommitId::new(Digest::of(b"c0"));

        repo.write_commit_ref(None, "repo", &CommitRef::new("main", c0), &cancel)
            .await
            .unwrap();
        // Retrying the same transition succeeds without touching the file.
        repo.write_commit_ref(None, "repo", &CommitRef::new("main", c0), &cancel)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn escaped_segments_roundtrip_through_listing() {
        let (_dir, repo) = repo();
        let cancel = token();
        let c0 = CommitId::new(Digest::of(b"c0"));

        repo.write_commit_ref(None, "my repo", &CommitRef::new("feature/x", c0), &cancel)
            .await
            .unwrap();
        repo.write_commit_ref(None, "my repo", &CommitRef::new("main", c0), &cancel)
            .await
            .unwrap();

        assert_eq!(repo.list_names(&cancel).await.unwrap(), ["my repo"]);
        let branches = repo.list_branches("my repo", &cancel).await.unwrap();
        let names: Vec<_> = branches.iter().map(|r| r.branch.as_str()).collect();
        assert_eq!(names, ["feature/x", "main"]);
        assert_eq!(branches[0].commit_id, c0);

        let read = repo
            .read_commit_ref("my repo", "feature/x", &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.commit_id, c0);
    }

    #[tokio::test]
    async fn listing_empty_store() {
        let (_dir, repo) = repo();
        let cancel = token();
        assert!(repo.list_names(&cancel).await.unwrap().is_empty());
        assert!(repo.list_branches("repo", &cancel).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn short_ref_payload_is_a_codec_error() {
        let (_dir, repo) = repo();
        let cancel = token();
        let path = paths::ref_path(repo.root(), "repo", "main");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"short").unwrap();

        let err = repo
            .read_commit_ref("repo", "main", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ChasmError::Codec(_)));
    }

    #[tokio::test]
    async fn blank_ref_arguments_rejected() {
        let (_dir, repo) = repo();
        let cancel = token();
        let c0 = CommitId::new(Digest::of(b"c0"));

        let err = repo
            .write_commit_ref(None, "", &CommitRef::new("main", c0), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ChasmError::InvalidArgument { name: "namespace" }));
        let err = repo
            .write_commit_ref(None, "repo", &CommitRef::new(" ", c0), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ChasmError::InvalidArgument { name: "branch" }));
        let err = repo
            .write_commit_ref(None, "repo", &CommitRef::new("main", CommitId::EMPTY), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ChasmError::InvalidArgument { name: "commitId" }));
    }

    #[tokio::test]
    async fn cancelled_write_leaves_no_object() {
        let (_dir, repo) = repo();
        let cancel = token();
        cancel.cancel();

        let err = repo.write(b"abc", None, false, &cancel).await.unwrap_err();
        assert!(matches!(err, ChasmError::Cancelled));
        assert!(!repo.root().join("objects").exists());
    }

    #[tokio::test]
    async fn concurrent_same_content_writes_create_once() {
        let dir = tempdir().unwrap();
        let repo = Arc::new(DiskRepository::open(dir.path(), Arc::new(BinaryCodec::new())));
        let cancel = token();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = Arc::clone(&repo);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                repo.write(b"contended", None, false, &cancel).await.unwrap()
            }));
        }
        let mut created = 0;
        for handle in handles {
            let result = handle.await.unwrap();
            assert_eq!(result.id, Digest::of(b"contended"));
            if result.created {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn concurrent_ref_create_has_single_winner() {
        let dir = tempdir().unwrap();
        let repo = Arc::new(DiskRepository::open(dir.path(), Arc::new(BinaryCodec::new())));
        let cancel = token();

        let mut handles = Vec::new();
        for i in 0..4u8 {
            let repo = Arc::clone(&repo);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                let id = CommitId::new(Digest::of(&[i]));
                repo.write_commit_ref(None, "repo", &CommitRef::new("main", id), &cancel)
                    .await
                    .map(|_| id)
            }));
        }
        let mut winners = Vec::new();
        for handle in handles {
            if let Ok(id) = handle.await.unwrap() {
                winners.push(id);
            }
        }
        assert_eq!(winners.len(), 1);
        let read = repo
            .read_commit_ref("repo", "main", &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.commit_id, winners[0]);
    }

    #[tokio::test]
    async fn json_codec_store_roundtrips() {
        let dir = tempdir().unwrap();
        let repo = DiskRepository::open(dir.path(), Arc::new(JsonCodec::new()));
        let cancel = token();
        let tree = sample_tree();

        let tree_id = repo.write_tree(&tree, &cancel).await.unwrap();
        assert_eq!(repo.read_tree(&tree_id, &cancel).await.unwrap().unwrap(), tree);

        let c0 = CommitId::new(Digest::of(b"c0"));
        repo.write_commit_ref(None, "repo", &CommitRef::new("main", c0), &cancel)
            .await
            .unwrap();
        let read = repo
            .read_commit_ref("repo", "main", &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.commit_id, c0);
    }
}
