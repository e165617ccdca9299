use url::Url;

use crate::blob::{BlobStorage, BlobStore, FileBlobStore};
use crate::contract::Storage;
use crate::engines::{CacheStorage, FileStorage, MemoryStorage, RemoteStorage};
use crate::error::{ErrorKind, StoreError};
use crate::filter::{gzip, AesFilter, EcdheFilter, GzipFilter, Lz4Filter, ZstdFilter};

/// Typed options consumed by pipeline stages during construction.
///
/// A stage that needs an option it cannot find fails the whole open
/// with `InitFailed`; unused sections are simply ignored.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub gzip: Option<GzipOptions>,
    pub aes: Option<AesOptions>,
    pub ecdhe: Option<EcdheOptions>,
    pub remote: Option<RemoteOptions>,
}

#[derive(Debug, Clone)]
pub struct GzipOptions {
    pub level: u32,
}

impl Default for GzipOptions {
    fn default() -> Self {
        Self {
            level: gzip::DEFAULT_LEVEL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AesOptions {
    pub passphrase: String,
}

/// PEM-encoded key material. Either half may be absent, which limits
/// the pipeline to the matching direction.
#[derive(Debug, Clone, Default)]
pub struct EcdheOptions {
    pub public_pem: Option<String>,
    pub private_pem: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RemoteOptions {
    pub token: Option<String>,
}

fn init_err(msg: impl Into<String>) -> StoreError {
    StoreError::with(ErrorKind::InitFailed, anyhow::anyhow!(msg.into()))
}

/// Open a storage pipeline from a URI.
///
/// The scheme is a `+`-joined chain read left to right as
/// outermost-to-innermost, terminated by a backend:
///
/// ```text
/// memory://
/// file:///srv/data
/// gzip+aes+file:///srv/backups
/// storaged://127.0.0.1:8080/myproject
/// cache://memory://,file:///srv/data
/// ```
///
/// `cache://` takes two comma-separated sub-URIs (first tier, second
/// tier), each opened recursively with the same config.
pub async fn open(uri: &str, config: &Config) -> Result<Box<dyn Storage>, StoreError> {
    // The cache URI embeds full sub-URIs, so it is taken apart before
    // any URL parsing can trip over the nested schemes.
    if let Some(rest) = uri.strip_prefix("cache://") {
        let Some((first, second)) = rest.split_once(',') else {
            return Err(init_err(format!(
                "cache uri needs two comma-separated tiers: {uri:?}"
            )));
        };
        let first = Box::pin(open(first, config)).await?;
        let second = Box::pin(open(second, config)).await?;
        return Ok(Box::new(CacheStorage::new(first, second)));
    }

    let parsed = Url::parse(uri).map_err(|err| StoreError::with(ErrorKind::InitFailed, err))?;
    let path = format!("{}{}", parsed.host_str().unwrap_or(""), parsed.path());
    let schemes: Vec<&str> = parsed.scheme().split('+').collect();

    match schemes.as_slice() {
        [single] => open_engine(single, uri, &path, config).await,
        [filters @ .., backend] => {
            let mut store = open_blob_backend(backend, &path)?;
            for scheme in filters.iter().rev() {
                store = wrap_filter(scheme, store, config)?;
            }
            Ok(Box::new(BlobStorage::new(store.into())))
        }
        [] => Err(init_err(format!("empty scheme in {uri:?}"))),
    }
}

async fn open_engine(
    scheme: &str,
    uri: &str,
    path: &str,
    config: &Config,
) -> Result<Box<dyn Storage>, StoreError> {
    match scheme {
        "memory" => Ok(Box::new(MemoryStorage::new())),
        "file" => Ok(Box::new(FileStorage::open(path).await?)),
        "storaged" | "sstoraged" => {
            let token = config.remote.as_ref().and_then(|r| r.token.clone());
            Ok(Box::new(RemoteStorage::open(uri, token)?))
        }
        "gzip" | "lz4" | "zstd" | "aes" | "ecdhe" => Err(init_err(format!(
            "filter scheme {scheme:?} needs a backend, e.g. {scheme}+file://..."
        ))),
        other => Err(init_err(format!("unknown scheme {other:?}"))),
    }
}

fn open_blob_backend(scheme: &str, path: &str) -> Result<Box<dyn BlobStore>, StoreError> {
    match scheme {
        "file" => Ok(Box::new(
            FileBlobStore::open(path).map_err(|err| StoreError::with(ErrorKind::InitFailed, err))?,
        )),
        "gzip" | "lz4" | "zstd" | "aes" | "ecdhe" => Err(init_err(format!(
            "pipeline must end in a backend, not filter {scheme:?}"
        ))),
        other => Err(init_err(format!(
            "scheme {other:?} cannot terminate a pipeline"
        ))),
    }
}

fn wrap_filter(
    scheme: &str,
    inner: Box<dyn BlobStore>,
    config: &Config,
) -> Result<Box<dyn BlobStore>, StoreError> {
    match scheme {
        "gzip" => {
            let level = config.gzip.clone().unwrap_or_default().level;
            Ok(Box::new(GzipFilter::new(inner, level)))
        }
        "lz4" => Ok(Box::new(Lz4Filter::new(inner))),
        "zstd" => Ok(Box::new(ZstdFilter::new(
            inner,
            crate::filter::zstd::DEFAULT_LEVEL,
        ))),
        "aes" => {
            let Some(aes) = &config.aes else {
                return Err(init_err("no key supplied"));
            };
            Ok(Box::new(AesFilter::new(inner, &aes.passphrase)))
        }
        "ecdhe" => {
            let Some(ecdhe) = &config.ecdhe else {
                return Err(init_err("no key supplied"));
            };
            if ecdhe.public_pem.is_none() && ecdhe.private_pem.is_none() {
                return Err(init_err("no key supplied"));
            }
            let filter = EcdheFilter::from_pem(
                inner,
                ecdhe.public_pem.as_deref(),
                ecdhe.private_pem.as_deref(),
            )
            .map_err(|err| StoreError::with(ErrorKind::InitFailed, err))?;
            Ok(Box::new(filter))
        }
        other => Err(init_err(format!("unknown scheme {other:?}"))),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::contract::ListOpts;

    #[tokio::test]
    async fn test_memory_uri() {
        let store = open("memory://", &Config::default()).await.unwrap();
        store.create_bucket("b").await.unwrap();
        store.put("b", "k", b"v").await.unwrap();
        assert_eq!(store.get("b", "k").await.unwrap(), b"v");
    }

    #[tokio::test]
    async fn test_file_uri() {
        let dir = tempfile::tempdir().unwrap();
        let uri = format!("file://{}", dir.path().display());
        let store = open(&uri, &Config::default()).await.unwrap();
        store.create_bucket("b").await.unwrap();
        store.put("b", "k", b"v").await.unwrap();
        assert_eq!(store.get("b", "k").await.unwrap(), b"v");
    }

    #[tokio::test]
    async fn test_unknown_scheme() {
        let err = open("leveldb:///tmp/x", &Config::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InitFailed);
        assert!(err.to_string().contains("unknown scheme"));
    }

    #[tokio::test]
    async fn test_filter_needs_backend() {
        let err = open("gzip:///tmp/x", &Config::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InitFailed);
    }

    #[tokio::test]
    async fn test_aes_needs_key() {
        let err = open("aes+file:///tmp/x", &Config::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InitFailed);
        assert!(err.to_string().contains("no key supplied"));
    }

    #[tokio::test]
    async fn test_cache_uri() {
        let store = open("cache://memory://,memory://", &Config::default())
            .await
            .unwrap();
        store.create_bucket("b").await.unwrap();
        store.put("b", "k", b"v").await.unwrap();
        assert_eq!(store.get("b", "k").await.unwrap(), b"v");
    }

    #[tokio::test]
    async fn test_cache_uri_needs_two_tiers() {
        let err = open("cache://memory://", &Config::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InitFailed);
    }

    #[tokio::test]
    async fn test_gzip_aes_file_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let uri = format!("gzip+aes+file://{}", dir.path().display());
        let config = Config {
            aes: Some(AesOptions {
                passphrase: "my-aes-key".into(),
            }),
            ..Config::default()
        };
        let store = open(&uri, &config).await.unwrap();

        let payload = b"a very repetitive payload ".repeat(64);
        store.create_bucket("b").await.unwrap();
        store.put("b", "k", &payload).await.unwrap();
        assert_eq!(store.get("b", "k").await.unwrap(), payload);

        let docs = store
            .list("b", ListOpts::All)
            .await
            .unwrap()
            .collect_all()
            .await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].value, payload);

        // What hits the disk is encrypted (outer aes layer) and
        // compressed underneath: no plaintext, no bare gzip magic.
        let raw = std::fs::read(dir.path().join("b").join("k")).unwrap();
        assert!(raw.len() < payload.len());
        assert_ne!(&raw[..2], &[0x1f, 0x8b]);
        assert!(!raw
            .windows(b"repetitive".len())
            .any(|w| w == b"repetitive"));
    }
}
