use std::io::Read;
use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::BlobStore;
use crate::contract::{Document, ListOpts, Storage};
use crate::error::{ErrorKind, StoreError};
use crate::list::DocStream;

/// Marker blob recording a bucket's existence. Its presence is what
/// distinguishes an empty bucket from a missing one.
const BUCKET_MARKER: &str = ".bucket";

/// Lifts a (possibly filtered) blob chain into the async storage
/// contract.
///
/// Buckets and keys map onto blob ids as `bucket/key`, with a
/// `bucket/.bucket` marker per bucket. The blob chain is synchronous
/// (file I/O, compression, ciphers), so every operation runs on the
/// blocking pool.
pub struct BlobStorage {
    store: Arc<dyn BlobStore>,
}

impl BlobStorage {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    fn id(bucket: &str, key: &str) -> String {
        format!("{bucket}/{key}")
    }

    fn marker(bucket: &str) -> String {
        format!("{bucket}/{BUCKET_MARKER}")
    }

    fn validate(name: &str, reject_marker: bool) -> Result<(), StoreError> {
        if name.is_empty() || name.contains('/') || (reject_marker && name == BUCKET_MARKER) {
            return Err(StoreError::with(
                ErrorKind::WriteFailed,
                anyhow::anyhow!("invalid name {name:?}"),
            ));
        }
        Ok(())
    }

    async fn require_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        Self::validate(bucket, false)
            .map_err(|_| StoreError::new(ErrorKind::BucketNotFound))?;
        let store = Arc::clone(&self.store);
        let marker = Self::marker(bucket);
        let exists = tokio::task::spawn_blocking(move || store.has(&marker))
            .await
            .map_err(|err| StoreError::with(ErrorKind::ReadFailed, err))?;
        if exists {
            Ok(())
        } else {
            Err(StoreError::new(ErrorKind::BucketNotFound))
        }
    }
}

fn write_blob(store: &dyn BlobStore, id: &str, value: &[u8]) -> std::io::Result<()> {
    let mut writer = store.get_writer(id)?;
    writer.write_all(value)?;
    writer.close()
}

fn read_blob(store: &dyn BlobStore, id: &str) -> std::io::Result<Vec<u8>> {
    let mut reader = store.get_reader(id)?;
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    reader.close()?;
    Ok(buf)
}

#[async_trait]
impl Storage for BlobStorage {
    async fn put(&self, bucket: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.require_bucket(bucket).await?;
        Self::validate(key, true)?;
        let store = Arc::clone(&self.store);
        let id = Self::id(bucket, key);
        let value = value.to_vec();
        tokio::task::spawn_blocking(move || write_blob(store.as_ref(), &id, &value))
            .await
            .map_err(|err| StoreError::with(ErrorKind::WriteFailed, err))?
            .map_err(|err| StoreError::with(ErrorKind::WriteFailed, err))
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.require_bucket(bucket).await?;
        Self::validate(key, true).map_err(|_| StoreError::new(ErrorKind::ReadFailed))?;
        let store = Arc::clone(&self.store);
        let id = Self::id(bucket, key);
        tokio::task::spawn_blocking(move || read_blob(store.as_ref(), &id))
            .await
            .map_err(|err| StoreError::with(ErrorKind::ReadFailed, err))?
            .map_err(|err| StoreError::with(ErrorKind::ReadFailed, err))
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.require_bucket(bucket).await?;
        Self::validate(key, true)?;
        let store = Arc::clone(&self.store);
        let id = Self::id(bucket, key);
        let result = tokio::task::spawn_blocking(move || store.delete(&id))
            .await
            .map_err(|err| StoreError::with(ErrorKind::WriteFailed, err))?;
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::with(ErrorKind::WriteFailed, err)),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        Self::validate(bucket, false)?;
        let store = Arc::clone(&self.store);
        let marker = Self::marker(bucket);
        tokio::task::spawn_blocking(move || write_blob(store.as_ref(), &marker, &[]))
            .await
            .map_err(|err| StoreError::with(ErrorKind::WriteFailed, err))?
            .map_err(|err| StoreError::with(ErrorKind::WriteFailed, err))
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        self.require_bucket(bucket).await?;
        let store = Arc::clone(&self.store);
        let prefix = format!("{bucket}/");
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            for id in store.list(&prefix)? {
                store.delete(&id)?;
            }
            Ok(())
        })
        .await
        .map_err(|err| StoreError::with(ErrorKind::WriteFailed, err))?
        .map_err(|err| StoreError::with(ErrorKind::WriteFailed, err))
    }

    async fn list(&self, bucket: &str, opts: ListOpts) -> Result<DocStream, StoreError> {
        self.require_bucket(bucket).await?;
        let store = Arc::clone(&self.store);
        let prefix = format!("{bucket}/");

        // Phase one: resolve the matching keys up front so a missing
        // bucket or unreadable index fails the call, not the stream.
        let keys = {
            let store = Arc::clone(&store);
            let prefix = prefix.clone();
            let opts = opts.clone();
            tokio::task::spawn_blocking(move || -> std::io::Result<Vec<String>> {
                let mut keys: Vec<String> = store
                    .list(&prefix)?
                    .into_iter()
                    .filter_map(|id| id.strip_prefix(&prefix).map(str::to_string))
                    .filter(|key| key != BUCKET_MARKER && opts.matches(key))
                    .collect();
                keys.sort();
                Ok(keys)
            })
            .await
            .map_err(|err| StoreError::with(ErrorKind::ReadFailed, err))?
            .map_err(|err| StoreError::with(ErrorKind::ReadFailed, err))?
        };

        // Phase two: a blocking producer decodes values one at a time.
        Ok(DocStream::spawn_blocking(move |tx| {
            for key in keys {
                let id = format!("{prefix}{key}");
                let value = match read_blob(store.as_ref(), &id) {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(key, %err, "skipping undecodable entry during list");
                        continue;
                    }
                };
                if tx.blocking_send(Document { key, value }).is_err() {
                    return;
                }
            }
        }))
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
