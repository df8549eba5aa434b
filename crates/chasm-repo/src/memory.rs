//! In-memory repository for tests and ephemeral embedding.
//!
//! [`MemoryRepository`] keeps objects and refs in `HashMap`s behind `RwLock`s
//! and implements only the backend primitives; everything else comes from the
//! [`Repository`] default layer. Data is lost when the value is dropped.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use chasm_codec::Serializer;
use chasm_types::{
    BlobMetadata, ChasmBlob, ChasmStream, CommitId, CommitRef, Digest, RequestContext,
    WriteResult,
};

use crate::cas::{decide_ref_update, require_non_blank, validate_ref_write, RefUpdate};
use crate::config::RepoConfig;
use crate::error::{ChasmError, ChasmResult};
use crate::traits::{PayloadProducer, Repository};

#[derive(Clone, Debug)]
struct StoredObject {
    bytes: Vec<u8>,
    metadata: Option<BlobMetadata>,
}

/// An in-memory implementation of [`Repository`].
pub struct MemoryRepository {
    codec: Arc<dyn Serializer>,
    config: RepoConfig,
    context: RequestContext,
    objects: RwLock<HashMap<Digest, StoredObject>>,
    // namespace -> branch -> commit id
    refs: RwLock<HashMap<String, HashMap<String, CommitId>>>,
}

impl MemoryRepository {
    /// Create an empty repository with the given codec and default config.
    pub fn new(codec: Arc<dyn Serializer>) -> Self {
        Self::with_config(codec, RepoConfig::default(), RequestContext::default())
    }

    /// Create an empty repository with explicit configuration.
    pub fn with_config(
        codec: Arc<dyn Serializer>,
        config: RepoConfig,
        context: RequestContext,
    ) -> Self {
        Self {
            codec,
            config,
            context,
            objects: RwLock::new(HashMap::new()),
            refs: RwLock::new(HashMap::new()),
        }
    }

    fn check_cancel(cancel: &CancellationToken) -> ChasmResult<()> {
        if cancel.is_cancelled() {
            return Err(ChasmError::Cancelled);
        }
        Ok(())
    }
}

fn poisoned<T>(_: T) -> ChasmError {
    ChasmError::Backend("lock poisoned".to_string())
}

#[async_trait]
impl Repository for MemoryRepository {
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
        Self::check_cancel(cancel)?;
        let objects = self.objects.read().map_err(poisoned)?;
        Ok(objects.contains_key(digest))
    }

    async fn read(
        &self,
        digest: &Digest,
        cancel: &CancellationToken,
    ) -> ChasmResult<Option<ChasmBlob>> {
        Self::check_cancel(cancel)?;
        let objects = self.objects.read().map_err(poisoned)?;
        Ok(objects
            .get(digest)
            .map(|obj| ChasmBlob::new(obj.bytes.clone(), obj.metadata.clone())))
    }

    async fn read_stream(
        &self,
        digest: &Digest,
        cancel: &CancellationToken,
    ) -> ChasmResult<Option<ChasmStream>> {
        Self::check_cancel(cancel)?;
        let objects = self.objects.read().map_err(poisoned)?;
        Ok(objects.get(digest).map(|obj| {
            ChasmStream::new(Box::new(Cursor::new(obj.bytes.clone())), obj.metadata.clone())
        }))
    }

    async fn write_with(
        &self,
        producer: PayloadProducer,
        metadata: Option<BlobMetadata>,
        force: bool,
        cancel: &CancellationToken,
    ) -> ChasmResult<WriteResult<Digest>> {
        Self::check_cancel(cancel)?;
        let mut bytes = Vec::new();
        producer(&mut bytes)?;
        let digest = Digest::of(&bytes);

        let mut objects = self.objects.write().map_err(poisoned)?;
        let existed = objects.contains_key(&digest);
        let created = if existed && !force {
            false
        } else {
            objects.insert(digest, StoredObject { bytes, metadata });
            !existed
        };
        debug!(digest = %digest, created, "stored object");
        Ok(WriteResult::new(digest, created))
    }

    async fn list_names(&self, cancel: &CancellationToken) -> ChasmResult<Vec<String>> {
        Self::check_cancel(cancel)?;
        let refs = self.refs.read().map_err(poisoned)?;
        let mut names: Vec<String> = refs.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn list_branches(
        &self,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> ChasmResult<Vec<CommitRef>> {
        require_non_blank(namespace, "namespace")?;
        Self::check_cancel(cancel)?;
        let refs = self.refs.read().map_err(poisoned)?;
        let mut branches: Vec<CommitRef> = refs
            .get(namespace)
            .map(|ns| {
                ns.iter()
                    .map(|(branch, id)| CommitRef::new(branch.clone(), *id))
                    .collect()
            })
            .unwrap_or_default();
        branches.sort_by(|a, b| a.branch.cmp(&b.branch));
        Ok(branches)
    }

    async fn read_commit_ref(
        &self,
        namespace: &str,
        branch: &str,
        cancel: &CancellationToken,
    ) -> ChasmResult<Option<CommitRef>> {
        require_non_blank(namespace, "namespace")?;
        require_non_blank(branch, "branch")?;
        Self::check_cancel(cancel)?;
        let refs = self.refs.read().map_err(poisoned)?;
        Ok(refs
            .get(namespace)
            .and_then(|ns| ns.get(branch))
            .map(|id| CommitRef::new(branch, *id)))
    }

    async fn write_commit_ref(
        &self,
        previous: Option<&CommitId>,
        namespace: &str,
        commit_ref: &CommitRef,
        cancel: &CancellationToken,
    ) -> ChasmResult<()> {
        validate_ref_write(namespace, commit_ref)?;
        Self::check_cancel(cancel)?;

        let mut refs = self.refs.write().map_err(poisoned)?;
        let ns = refs.entry(namespace.to_string()).or_default();
        let observed = ns.get(&commit_ref.branch);
        match decide_ref_update(observed, previous, &commit_ref.commit_id) {
            Some(RefUpdate::Noop) => Ok(()),
            Some(RefUpdate::Create) | Some(RefUpdate::Replace) => {
                ns.insert(commit_ref.branch.clone(), commit_ref.commit_id);
                debug!(
                    namespace,
                    branch = %commit_ref.branch,
                    commit = %commit_ref.commit_id,
                    "advanced commit ref"
                );
                Ok(())
            }
            None => Err(ChasmError::Conflict {
                namespace: namespace.to_string(),
                branch: commit_ref.branch.clone(),
            }),
        }
    }
}
