//! duel-sc library - Similarity scoring service
//!
//! Exposes the Similarity Engine over HTTP so the hub (or any other
//! caller) can score two fingerprint lists without linking the engine.

use axum::Router;
use duel_common::similarity::SimilarityEngine;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub mod api;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Scoring engine (confidence curve is fixed at startup)
    pub engine: Arc<SimilarityEngine>,
}

impl AppState {
    pub fn new(engine: SimilarityEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(SimilarityEngine::default())
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::post;

    Router::new()
        .route("/compare-hashes", post(api::compare_hashes))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the scoring API until `shutdown` resolves
///
/// In-flight requests are allowed to finish before this returns.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
