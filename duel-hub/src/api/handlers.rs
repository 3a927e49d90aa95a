//! HTTP request handlers
//!
//! Read-only views of hub state. All mutations arrive over the WebSocket.

use super::server::AppContext;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    Json,
};
use duel_common::protocol::{MatchId, MatchPhase, ParticipantSlot};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    /// Live WebSocket connections
    pub connections: usize,
    /// Matches held by the registry
    pub matches: usize,
    /// "inline" or "remote (<url>)"
    pub scoring: String,
}

/// Snapshot of one match
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStatusResponse {
    pub match_id: MatchId,
    pub phase: MatchPhase,
    /// Connections currently observing the match
    pub room_size: usize,
    pub user1: ParticipantSlot,
    pub user2: ParticipantSlot,
}

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "duel-hub".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: ctx.hub.connection_count().await,
        matches: ctx.hub.registry().match_count().await,
        scoring: ctx.hub.scorer().describe(),
    })
}

/// GET /matches/:match_id
///
/// 404 when the match was never joined (or has been evicted).
pub async fn get_match(
    State(ctx): State<AppContext>,
    Path(match_id): Path<String>,
) -> ApiResult<Json<MatchStatusResponse>> {
    debug!(match_id = %match_id, "Match snapshot requested");

    let state = ctx
        .hub
        .registry()
        .get_state(&match_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("match {}", match_id)))?;

    Ok(Json(MatchStatusResponse {
        phase: state.phase(),
        room_size: ctx.hub.room_size(&match_id).await,
        match_id: state.match_id,
        user1: state.participant1,
        user2: state.participant2,
    }))
}
