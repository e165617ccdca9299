use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};

use crate::error::StoreError;
use crate::list::DocStream;

/// A single listed entry: a key and its value.
///
/// The serialized shape is `{"Key": "...", "Value": "<base64>"}`, which is
/// what the HTTP layer streams and what the remote engine parses back.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde_as(as = "Base64")]
    #[serde(rename = "Value")]
    pub value: Vec<u8>,
}

/// Options for [`Storage::list`]. Exactly one mode is active per call.
///
/// Keys are compared bytewise lexicographically, independent of any
/// backend-native ordering primitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ListOpts {
    /// Full bucket scan
    #[default]
    All,
    /// Keys sharing a byte prefix
    Prefix(String),
    /// Keys in `start..end` (start inclusive, end exclusive)
    Range { start: String, end: String },
}

impl ListOpts {
    /// Whether `key` falls inside this selection.
    ///
    /// Backends with a native range/prefix query push the selection down
    /// for efficiency; the output must be identical to filtering a full
    /// scan through this predicate.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            ListOpts::All => true,
            ListOpts::Prefix(prefix) => key.starts_with(prefix.as_str()),
            ListOpts::Range { start, end } => start.as_str() <= key && key < end.as_str(),
        }
    }
}

/// The capability contract implemented by every backend and composite.
///
/// Implementations must be safe for concurrent use from multiple callers
/// against the same instance; any required serialization (locking,
/// transactions) is the backend's responsibility.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Save a value under `bucket`/`key`. Upsert semantics: no prior
    /// existence of the key is required, but the bucket must exist.
    async fn put(&self, bucket: &str, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Load the value stored under `bucket`/`key`.
    ///
    /// Fails with `ReadFailed` if the key is absent and `BucketNotFound`
    /// if the bucket itself is absent.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Delete a key.
    ///
    /// Fails with `BucketNotFound` if the bucket is absent; deleting an
    /// absent key in an existing bucket succeeds silently.
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError>;

    /// Create a bucket. Recreating an existing bucket succeeds silently.
    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError>;

    /// Delete a bucket and everything in it.
    /// Fails with `BucketNotFound` if the bucket is absent.
    async fn delete_bucket(&self, bucket: &str) -> Result<(), StoreError>;

    /// List the documents of a bucket in ascending key order.
    ///
    /// Returns early with `BucketNotFound` if the bucket cannot be
    /// resolved; otherwise the returned [`DocStream`] is a finite,
    /// single-pass sequence fed by a background producer (see
    /// [`crate::list`] for the cancellation contract).
    async fn list(&self, bucket: &str, opts: ListOpts) -> Result<DocStream, StoreError>;

    /// Close the storage. Idempotent: a second close also succeeds.
    async fn close(&self) -> Result<(), StoreError>;
}

impl std::fmt::Debug for dyn Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Storage")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_list_opts_matches() {
        assert!(ListOpts::All.matches("anything"));

        let prefix = ListOpts::Prefix("01".into());
        assert!(prefix.matches("010"));
        assert!(prefix.matches("01"));
        assert!(!prefix.matches("020"));

        let range = ListOpts::Range {
            start: "023".into(),
            end: "100".into(),
        };
        assert!(range.matches("023"));
        assert!(range.matches("099"));
        assert!(!range.matches("100"));
        assert!(!range.matches("022"));
    }

    #[test]
    fn test_document_wire_shape() {
        let doc = Document {
            key: "foo".into(),
            value: b"hello world".to_vec(),
        };
        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(json, r#"{"Key":"foo","Value":"aGVsbG8gd29ybGQ="}"#);

        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}
