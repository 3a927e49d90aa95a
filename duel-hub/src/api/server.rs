//! HTTP server setup and routing
//!
//! Axum router for the WebSocket endpoint, match snapshots, SSE and health.

use crate::hub::SessionHub;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub hub: Arc<SessionHub>,
}

impl AppContext {
    pub fn new(hub: Arc<SessionHub>) -> Self {
        Self { hub }
    }
}

/// Build the duel-hub router
///
/// CORS is permissive: participant and judge pages are served from other origins.
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))
        // Duel WebSocket
        .route("/ws", get(super::ws::ws_handler))
        // Match snapshots
        .route("/matches/:match_id", get(super::handlers::get_match))
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
