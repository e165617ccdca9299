/**
 * HTTP interface over a storage pipeline.
 *  Routes under /v1/{project}/{bucket}[/{key}] map one-to-one onto the
 *  storage contract; list responses stream as a JSON array.
 */
pub mod body;
pub mod handlers;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::put;
use axum::Router;
use tokio::sync::watch;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::{info, Level};

use cask_store::prelude::Storage;
use state::ServiceState;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the router. Split from [`run`] so tests can drive it without
/// a socket.
pub fn router(store: Arc<dyn Storage>) -> Router {
    let state = ServiceState { store };
    Router::new()
        .route(
            "/v1/:project/:bucket",
            put(handlers::create_bucket)
                .get(handlers::list)
                .delete(handlers::delete_bucket),
        )
        .route(
            "/v1/:project/:bucket/:key",
            put(handlers::put_key)
                .get(handlers::get_key)
                .delete(handlers::delete_key),
        )
        .layer(
            TraceLayer::new_for_http()
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::DEBUG)
                        .latency_unit(LatencyUnit::Micros),
                )
                .on_failure(DefaultOnFailure::new().level(Level::WARN)),
        )
        .with_state(state)
}

/// Serve until the shutdown signal fires, then drain in-flight
/// requests and close the store.
pub async fn run(
    addr: SocketAddr,
    store: Arc<dyn Storage>,
    mut shutdown: watch::Receiver<()>,
) -> Result<(), ServerError> {
    let app = router(Arc::clone(&store));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
            info!("shutdown signal received");
        })
        .await?;

    if let Err(err) = store.close().await {
        tracing::warn!(%err, "store close failed during shutdown");
    }
    Ok(())
}
