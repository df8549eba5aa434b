use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

/// Optional annotations stored alongside an object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobMetadata {
    /// MIME content type of the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Original file name of the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl BlobMetadata {
    pub fn new(content_type: Option<String>, filename: Option<String>) -> Self {
        Self {
            content_type,
            filename,
        }
    }

    /// Returns `true` if neither field is set.
    pub fn is_empty(&self) -> bool {
        self.content_type.is_none() && self.filename.is_none()
    }
}

/// An object payload materialized in memory, with its metadata when present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChasmBlob {
    /// The payload bytes.
    pub bytes: Vec<u8>,
    /// Sidecar metadata, if any was stored.
    pub metadata: Option<BlobMetadata>,
}

impl ChasmBlob {
    pub fn new(bytes: Vec<u8>, metadata: Option<BlobMetadata>) -> Self {
        Self { bytes, metadata }
    }
}

/// An object payload yielded lazily as an async byte stream.
pub struct ChasmStream {
    /// Reader over the payload bytes.
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    /// Sidecar metadata, if any was stored.
    pub metadata: Option<BlobMetadata>,
}

impl ChasmStream {
    pub fn new(reader: Box<dyn AsyncRead + Send + Unpin>, metadata: Option<BlobMetadata>) -> Self {
        Self { reader, metadata }
    }
}

impl std::fmt::Debug for ChasmStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChasmStream")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// The outcome of an idempotent write.
///
/// `created` is `false` when the target already existed and the write was a
/// no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteResult<T> {
    /// The address the payload landed at.
    pub id: T,
    /// Whether this call materialized the object.
    pub created: bool,
}

impl<T> WriteResult<T> {
    pub fn new(id: T, created: bool) -> Self {
        Self { id, created }
    }

    /// Map the id, preserving the created flag.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> WriteResult<U> {
        WriteResult {
            id: f(self.id),
            created: self.created,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_emptiness() {
        assert!(BlobMetadata::default().is_empty());
        assert!(!BlobMetadata::new(Some("text/plain".into()), None).is_empty());
        assert!(!BlobMetadata::new(None, Some("a.txt".into())).is_empty());
    }

    #[test]
    fn metadata_serde_omits_absent_fields() {
        let json = serde_json::to_string(&BlobMetadata::new(Some("text/plain".into()), None))
            .unwrap();
        assert_eq!(json, r#"{"contentType":"text/plain"}"#);
        let parsed: BlobMetadata = serde_json::from_str("{}").unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn write_result_map_preserves_created() {
        let result = WriteResult::new(7u32, true).map(|n| n.to_string());
        assert_eq!(result.id, "7");
        assert!(result.created);
    }
}
