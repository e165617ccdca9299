use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use crate::contract::{Document, ListOpts, Storage};
use crate::error::{ErrorKind, StoreError};
use crate::list::DocStream;

/// Filesystem storage engine.
///
/// Buckets are directories under the root, keys are files inside them.
/// Bucket and key names are validated against path traversal before
/// they touch the filesystem.
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open a file store rooted at `root`, creating the directory if
    /// it does not exist yet.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|err| StoreError::with(ErrorKind::InitFailed, err))?;
        Ok(Self { root })
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf, StoreError> {
        validate_name(bucket).map_err(|err| StoreError::with(ErrorKind::BucketNotFound, err))?;
        Ok(self.root.join(bucket))
    }

    fn key_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let dir = self.bucket_path(bucket)?;
        validate_name(key).map_err(|err| StoreError::with(ErrorKind::WriteFailed, err))?;
        Ok(dir.join(key))
    }

    async fn require_bucket(&self, bucket: &str) -> Result<PathBuf, StoreError> {
        let dir = self.bucket_path(bucket)?;
        if !tokio::fs::try_exists(&dir)
            .await
            .map_err(|err| StoreError::with(ErrorKind::BucketNotFound, err))?
        {
            return Err(StoreError::new(ErrorKind::BucketNotFound));
        }
        Ok(dir)
    }
}

/// Reject names that would escape the store root or collide with
/// directory metadata.
fn validate_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty() {
        anyhow::bail!("empty name");
    }
    if name == "." || name == ".." {
        anyhow::bail!("reserved name {name:?}");
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        anyhow::bail!("name {name:?} contains a path separator");
    }
    Ok(())
}

async fn sorted_keys(dir: &Path, opts: &ListOpts) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut keys = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if opts.matches(&name) {
            keys.push(name);
        }
    }
    keys.sort();
    Ok(keys)
}

#[async_trait]
impl Storage for FileStorage {
    async fn put(&self, bucket: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.require_bucket(bucket).await?;
        let path = self.key_path(bucket, key)?;
        tokio::fs::write(&path, value)
            .await
            .map_err(|err| StoreError::with(ErrorKind::WriteFailed, err))
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.require_bucket(bucket).await?;
        let path = self.key_path(bucket, key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|err| StoreError::with(ErrorKind::ReadFailed, err))
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.require_bucket(bucket).await?;
        let path = self.key_path(bucket, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Deleting an absent key is not an error.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::with(ErrorKind::WriteFailed, err)),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let dir = self.bucket_path(bucket)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|err| StoreError::with(ErrorKind::WriteFailed, err))
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let dir = self.require_bucket(bucket).await?;
        tokio::fs::remove_dir_all(&dir)
            .await
            .map_err(|err| StoreError::with(ErrorKind::WriteFailed, err))
    }

    async fn list(&self, bucket: &str, opts: ListOpts) -> Result<DocStream, StoreError> {
        let dir = self.require_bucket(bucket).await?;
        let keys = sorted_keys(&dir, &opts)
            .await
            .map_err(|err| StoreError::with(ErrorKind::ReadFailed, err))?;

        // Values are read lazily by the producer so a large bucket is
        // never fully buffered. Unreadable entries (deleted between the
        // directory scan and the read) are skipped with a warning.
        Ok(DocStream::spawn(move |tx| async move {
            for key in keys {
                let path = dir.join(&key);
                let value = match tokio::fs::read(&path).await {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(key, %err, "skipping unreadable entry during list");
                        continue;
                    }
                };
                if tx.send(Document { key, value }).await.is_err() {
                    return;
                }
            }
        }))
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    async fn open_temp() -> (tempfile::TempDir, FileStorage) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::open(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let (_dir, store) = open_temp().await;
        store.create_bucket("b").await.unwrap();
        store.put("b", "k", b"payload").await.unwrap();
        assert_eq!(store.get("b", "k").await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_bucket_must_exist() {
        let (_dir, store) = open_temp().await;
        let err = store.put("missing", "k", b"v").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BucketNotFound);
        let err = store.list("missing", ListOpts::All).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BucketNotFound);
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let (_dir, store) = open_temp().await;
        store.create_bucket("b").await.unwrap();
        assert!(store.put("b", "../escape", b"v").await.is_err());
        assert!(store.put("b", "a/b", b"v").await.is_err());
        assert!(store.create_bucket("..").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_silent() {
        let (_dir, store) = open_temp().await;
        store.create_bucket("b").await.unwrap();
        store.delete("b", "never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_prefix_sorted() {
        let (_dir, store) = open_temp().await;
        store.create_bucket("b").await.unwrap();
        for key in ["020", "010", "015", "100"] {
            store.put("b", key, key.as_bytes()).await.unwrap();
        }
        let docs = store
            .list("b", ListOpts::Prefix("01".into()))
            .await
            .unwrap()
            .collect_all()
            .await;
        let keys: Vec<_> = docs.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, ["010", "015"]);
    }

    #[tokio::test]
    async fn test_delete_bucket_removes_contents() {
        let (_dir, store) = open_temp().await;
        store.create_bucket("b").await.unwrap();
        store.put("b", "k", b"v").await.unwrap();
        store.delete_bucket("b").await.unwrap();
        let err = store.get("b", "k").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BucketNotFound);
    }
}
