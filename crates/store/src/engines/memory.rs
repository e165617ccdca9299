use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::contract::{Document, ListOpts, Storage};
use crate::error::{ErrorKind, StoreError};
use crate::list::DocStream;

/// In-memory storage engine.
///
/// Buckets are ordered maps, so listing pushes prefix/range selection
/// down to `BTreeMap::range` instead of scanning the whole bucket.
/// Everything is gone when the instance is dropped.
#[derive(Default)]
pub struct MemoryStorage {
    buckets: Arc<RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn select(bucket: &BTreeMap<String, Vec<u8>>, opts: &ListOpts) -> Vec<Document> {
        let entries: Vec<(&String, &Vec<u8>)> = match opts {
            ListOpts::All => bucket.iter().collect(),
            ListOpts::Prefix(prefix) => bucket
                .range::<String, _>((Bound::Included(prefix), Bound::Unbounded))
                .take_while(|(key, _)| key.starts_with(prefix.as_str()))
                .collect(),
            ListOpts::Range { start, end } => {
                // An inverted or empty range selects nothing; BTreeMap::range
                // panics on start > end, so guard here.
                if start >= end {
                    return Vec::new();
                }
                bucket
                    .range::<String, _>((Bound::Included(start), Bound::Excluded(end)))
                    .collect()
            }
        };
        entries
            .into_iter()
            .map(|(key, value)| Document {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, bucket: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write();
        let entries = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::new(ErrorKind::BucketNotFound))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let buckets = self.buckets.read();
        let entries = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::new(ErrorKind::BucketNotFound))?;
        entries
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::new(ErrorKind::ReadFailed))
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write();
        let entries = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::new(ErrorKind::BucketNotFound))?;
        entries.remove(key);
        Ok(())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write();
        buckets.entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write();
        buckets
            .remove(bucket)
            .map(|_| ())
            .ok_or_else(|| StoreError::new(ErrorKind::BucketNotFound))
    }

    async fn list(&self, bucket: &str, opts: ListOpts) -> Result<DocStream, StoreError> {
        // Snapshot under the read lock; the stream then serves the
        // snapshot without holding the lock across consumer polls.
        let docs = {
            let buckets = self.buckets.read();
            let entries = buckets
                .get(bucket)
                .ok_or_else(|| StoreError::new(ErrorKind::BucketNotFound))?;
            Self::select(entries, &opts)
        };
        Ok(DocStream::from_documents(docs))
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
