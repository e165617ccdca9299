use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use crate::contract::{Document, ListOpts, Storage};
use crate::error::{ErrorKind, StoreError};
use crate::list::DocStream;

/// Client engine talking to a remote daemon over its HTTP interface.
///
/// URIs use the `storaged` (plain HTTP) or `sstoraged` (TLS) scheme;
/// the URI path selects the project namespace on the remote side, e.g.
/// `storaged://127.0.0.1:8080/myproject`.
#[derive(Debug)]
pub struct RemoteStorage {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RemoteStorage {
    pub fn open(uri: &str, token: Option<String>) -> Result<Self, StoreError> {
        let uri = Url::parse(uri).map_err(|err| StoreError::with(ErrorKind::InitFailed, err))?;
        let proto = match uri.scheme() {
            "storaged" => "http",
            "sstoraged" => "https",
            other => {
                return Err(StoreError::with(
                    ErrorKind::InitFailed,
                    anyhow::anyhow!("unknown remote scheme {other:?}"),
                ))
            }
        };
        let host = uri
            .host_str()
            .ok_or_else(|| StoreError::with(ErrorKind::InitFailed, anyhow::anyhow!("missing host")))?;
        let authority = match uri.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let base_url = format!("{proto}://{authority}/v1{}", uri.path());
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            token,
        })
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    fn key_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{bucket}/{key}", self.base_url)
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!("{}/{bucket}", self.base_url)
    }
}

/// Map a non-success response to the taxonomy: the daemon collapses
/// unknown buckets and keys to 404, everything else is the given kind.
fn check_status(status: StatusCode, kind: ErrorKind) -> Result<(), StoreError> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::NOT_FOUND {
        return Err(StoreError::new(ErrorKind::BucketNotFound));
    }
    Err(StoreError::with(
        kind,
        anyhow::anyhow!("remote returned status {status}"),
    ))
}

#[async_trait]
impl Storage for RemoteStorage {
    async fn put(&self, bucket: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let resp = self
            .request(reqwest::Method::PUT, self.key_url(bucket, key))
            .body(value.to_vec())
            .send()
            .await
            .map_err(|err| StoreError::with(ErrorKind::WriteFailed, err))?;
        check_status(resp.status(), ErrorKind::WriteFailed)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let resp = self
            .request(reqwest::Method::GET, self.key_url(bucket, key))
            .send()
            .await
            .map_err(|err| StoreError::with(ErrorKind::ReadFailed, err))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::new(ErrorKind::ReadFailed));
        }
        check_status(resp.status(), ErrorKind::ReadFailed)?;
        let body = resp
            .bytes()
            .await
            .map_err(|err| StoreError::with(ErrorKind::ReadFailed, err))?;
        Ok(body.to_vec())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let resp = self
            .request(reqwest::Method::DELETE, self.key_url(bucket, key))
            .send()
            .await
            .map_err(|err| StoreError::with(ErrorKind::WriteFailed, err))?;
        check_status(resp.status(), ErrorKind::WriteFailed)
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let resp = self
            .request(reqwest::Method::PUT, self.bucket_url(bucket))
            .send()
            .await
            .map_err(|err| StoreError::with(ErrorKind::WriteFailed, err))?;
        check_status(resp.status(), ErrorKind::WriteFailed)
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let resp = self
            .request(reqwest::Method::DELETE, self.bucket_url(bucket))
            .send()
            .await
            .map_err(|err| StoreError::with(ErrorKind::WriteFailed, err))?;
        check_status(resp.status(), ErrorKind::WriteFailed)
    }

    async fn list(&self, bucket: &str, opts: ListOpts) -> Result<DocStream, StoreError> {
        let mut req = self.request(reqwest::Method::GET, self.bucket_url(bucket));
        match &opts {
            ListOpts::All => {}
            ListOpts::Prefix(prefix) => req = req.query(&[("prefix", prefix.as_str())]),
            ListOpts::Range { start, end } => {
                req = req.query(&[("start", start.as_str()), ("end", end.as_str())])
            }
        }
        let resp = req
            .send()
            .await
            .map_err(|err| StoreError::with(ErrorKind::ReadFailed, err))?;
        check_status(resp.status(), ErrorKind::ReadFailed)?;
        let docs: Vec<Document> = resp
            .json()
            .await
            .map_err(|err| StoreError::with(ErrorKind::ReadFailed, err))?;
        Ok(DocStream::from_documents(docs))
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
