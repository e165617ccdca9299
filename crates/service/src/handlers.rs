use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::warn;

use cask_store::prelude::{ErrorKind, ListOpts, StoreError};

use crate::body::JsonArrayBody;
use crate::state::ServiceState;

/// Buckets are namespaced per project on the wire; the store sees a
/// single flat `project:bucket` name.
fn scoped_bucket(project: &str, bucket: &str) -> String {
    format!("{project}:{bucket}")
}

/// The wire collapses the error taxonomy to two classes: things that
/// were not found and everything else.
fn status_for(err: &StoreError) -> StatusCode {
    match err.kind() {
        ErrorKind::BucketNotFound | ErrorKind::ReadFailed => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    }
}

pub async fn put_key(
    State(state): State<ServiceState>,
    Path((project, bucket, key)): Path<(String, String, String)>,
    body: Bytes,
) -> Response {
    let bucket = scoped_bucket(&project, &bucket);
    match state.store.put(&bucket, &key, &body).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            warn!(bucket, key, %err, "put failed");
            status_for(&err).into_response()
        }
    }
}

pub async fn get_key(
    State(state): State<ServiceState>,
    Path((project, bucket, key)): Path<(String, String, String)>,
) -> Response {
    let bucket = scoped_bucket(&project, &bucket);
    match state.store.get(&bucket, &key).await {
        Ok(value) => value.into_response(),
        Err(err) => {
            warn!(bucket, key, %err, "get failed");
            status_for(&err).into_response()
        }
    }
}

pub async fn delete_key(
    State(state): State<ServiceState>,
    Path((project, bucket, key)): Path<(String, String, String)>,
) -> Response {
    let bucket = scoped_bucket(&project, &bucket);
    match state.store.delete(&bucket, &key).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            warn!(bucket, key, %err, "delete failed");
            status_for(&err).into_response()
        }
    }
}

pub async fn create_bucket(
    State(state): State<ServiceState>,
    Path((project, bucket)): Path<(String, String)>,
) -> Response {
    let bucket = scoped_bucket(&project, &bucket);
    match state.store.create_bucket(&bucket).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            warn!(bucket, %err, "create bucket failed");
            status_for(&err).into_response()
        }
    }
}

pub async fn delete_bucket(
    State(state): State<ServiceState>,
    Path((project, bucket)): Path<(String, String)>,
) -> Response {
    let bucket = scoped_bucket(&project, &bucket);
    match state.store.delete_bucket(&bucket).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            warn!(bucket, %err, "delete bucket failed");
            status_for(&err).into_response()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub every: Option<u64>,
}

impl ListParams {
    fn opts(&self) -> ListOpts {
        if let Some(prefix) = self.prefix.as_deref().filter(|p| !p.is_empty()) {
            return ListOpts::Prefix(prefix.to_string());
        }
        if self.start.is_some() || self.end.is_some() {
            return ListOpts::Range {
                start: self.start.clone().unwrap_or_default(),
                end: self.end.clone().unwrap_or_default(),
            };
        }
        ListOpts::All
    }
}

pub async fn list(
    State(state): State<ServiceState>,
    Path((project, bucket)): Path<(String, String)>,
    Query(params): Query<ListParams>,
) -> Response {
    let bucket = scoped_bucket(&project, &bucket);
    let stream = match state.store.list(&bucket, params.opts()).await {
        Ok(stream) => stream,
        Err(err) => {
            warn!(bucket, %err, "list failed");
            return status_for(&err).into_response();
        }
    };
    let stream = match params.every {
        Some(n) => stream.every(n),
        None => stream,
    };
    (
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(JsonArrayBody::new(stream)),
    )
        .into_response()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::router;
    use axum::body::to_bytes;
    use axum::http::Request;
    use cask_store::engines::MemoryStorage;
    use cask_store::prelude::Document;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> axum::Router {
        router(Arc::new(MemoryStorage::new()))
    }

    async fn send(
        app: &axum::Router,
        method: &str,
        uri: &str,
        body: &[u8],
    ) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body.to_vec()))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_put_get_delete_roundtrip() {
        let app = app();
        let (status, _) = send(&app, "PUT", "/v1/p/b", b"").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, "PUT", "/v1/p/b/k", b"payload").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, "GET", "/v1/p/b/k", b"").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"payload");

        let (status, _) = send(&app, "DELETE", "/v1/p/b/k", b"").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, "GET", "/v1/p/b/k", b"").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_projects_are_isolated() {
        let app = app();
        send(&app, "PUT", "/v1/p1/b", b"").await;
        send(&app, "PUT", "/v1/p1/b/k", b"v").await;

        // Same bucket name under another project does not exist.
        let (status, _) = send(&app, "GET", "/v1/p2/b/k", b"").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_put_without_bucket_is_not_found() {
        let app = app();
        let (status, _) = send(&app, "PUT", "/v1/p/missing/k", b"v").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_streams_json_array() {
        let app = app();
        send(&app, "PUT", "/v1/p/b", b"").await;
        for key in ["a", "b", "c"] {
            send(&app, "PUT", &format!("/v1/p/b/{key}"), key.as_bytes()).await;
        }

        let (status, body) = send(&app, "GET", "/v1/p/b", b"").await;
        assert_eq!(status, StatusCode::OK);
        let docs: Vec<Document> = serde_json::from_slice(&body).unwrap();
        let keys: Vec<_> = docs.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(docs[0].value, b"a");
    }

    #[tokio::test]
    async fn test_list_empty_bucket_is_empty_array() {
        let app = app();
        send(&app, "PUT", "/v1/p/b", b"").await;
        let (status, body) = send(&app, "GET", "/v1/p/b", b"").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"[]");
    }

    #[tokio::test]
    async fn test_list_query_params() {
        let app = app();
        send(&app, "PUT", "/v1/p/b", b"").await;
        for i in 0..100 {
            let key = format!("{i:03}");
            send(&app, "PUT", &format!("/v1/p/b/{key}"), key.as_bytes()).await;
        }

        let (_, body) = send(&app, "GET", "/v1/p/b?prefix=01", b"").await;
        let docs: Vec<Document> = serde_json::from_slice(&body).unwrap();
        assert_eq!(docs.len(), 10);
        assert_eq!(docs[0].key, "010");

        let (_, body) = send(&app, "GET", "/v1/p/b?start=023&end=100", b"").await;
        let docs: Vec<Document> = serde_json::from_slice(&body).unwrap();
        assert_eq!(docs.len(), 77);

        let (_, body) = send(&app, "GET", "/v1/p/b?every=10", b"").await;
        let docs: Vec<Document> = serde_json::from_slice(&body).unwrap();
        assert_eq!(docs.len(), 10);
        assert_eq!(docs[0].key, "009");
    }

    #[tokio::test]
    async fn test_malformed_every_is_bad_request() {
        let app = app();
        send(&app, "PUT", "/v1/p/b", b"").await;
        let (status, _) = send(&app, "GET", "/v1/p/b?every=soon", b"").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_missing_bucket_is_not_found() {
        let app = app();
        let (status, _) = send(&app, "GET", "/v1/p/missing", b"").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
