use async_trait::async_trait;
use tracing::debug;

use crate::contract::{ListOpts, Storage};
use crate::error::{ErrorKind, StoreError};
use crate::list::DocStream;

/// Two-tier composite: a fast first tier backed by an authoritative
/// second tier.
///
/// Writes, deletes and bucket operations are applied to both tiers and
/// both outcomes are reported. Reads fall through from the first tier
/// to the second; a second-tier hit repopulates the first tier on a
/// best-effort basis.
pub struct CacheStorage {
    first: Box<dyn Storage>,
    second: Box<dyn Storage>,
}

impl CacheStorage {
    pub fn new(first: Box<dyn Storage>, second: Box<dyn Storage>) -> Self {
        Self { first, second }
    }

    /// Combine the per-tier outcomes of a dual write. Both operations
    /// have already run; this only decides what the caller sees.
    fn combine(
        kind: ErrorKind,
        first: Result<(), StoreError>,
        second: Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        match (first, second) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(err), Ok(())) => Err(StoreError::with_all(
                kind,
                vec![anyhow::anyhow!(err).context("first level fail")],
            )),
            (Ok(()), Err(err)) => Err(StoreError::with_all(
                kind,
                vec![anyhow::anyhow!(err).context("second level fail")],
            )),
            (Err(first), Err(second)) => Err(StoreError::with_all(
                kind,
                vec![
                    anyhow::anyhow!("both levels failed"),
                    anyhow::anyhow!(first).context("first level fail"),
                    anyhow::anyhow!(second).context("second level fail"),
                ],
            )),
        }
    }
}

#[async_trait]
impl Storage for CacheStorage {
    async fn put(&self, bucket: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let first = self.first.put(bucket, key, value).await;
        let second = self.second.put(bucket, key, value).await;
        Self::combine(ErrorKind::WriteFailed, first, second)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        match self.first.get(bucket, key).await {
            Ok(value) => return Ok(value),
            Err(err) => debug!(bucket, key, %err, "first tier miss"),
        }
        let value = self.second.get(bucket, key).await?;
        // Best-effort repopulation; a failure here must not fail the read.
        if let Err(err) = self.first.put(bucket, key, &value).await {
            debug!(bucket, key, %err, "first tier repopulation failed");
        }
        Ok(value)
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let first = self.first.delete(bucket, key).await;
        let second = self.second.delete(bucket, key).await;
        Self::combine(ErrorKind::WriteFailed, first, second)
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let first = self.first.create_bucket(bucket).await;
        let second = self.second.create_bucket(bucket).await;
        Self::combine(ErrorKind::WriteFailed, first, second)
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let first = self.first.delete_bucket(bucket).await;
        let second = self.second.delete_bucket(bucket).await;
        Self::combine(ErrorKind::WriteFailed, first, second)
    }

    async fn list(&self, bucket: &str, opts: ListOpts) -> Result<DocStream, StoreError> {
        // Writes go through both tiers, so the first tier is complete
        // under normal operation; the second only serves the retry.
        match self.first.list(bucket, opts.clone()).await {
            Ok(stream) => Ok(stream),
            Err(err) => {
                debug!(bucket, %err, "first tier list failed, retrying second");
                self.second.list(bucket, opts).await
            }
        }
    }

    async fn close(&self) -> Result<(), StoreError> {
        let first = self.first.close().await;
        let second = self.second.close().await;
        Self::combine(ErrorKind::CloseFailed, first, second)
    }
}
