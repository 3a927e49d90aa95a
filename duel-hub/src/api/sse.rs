//! Server-Sent Events (SSE) broadcaster
//!
//! Streams hub events (joins, submissions, ready matches) to monitors.

use super::server::AppContext;
use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;

/// Query parameters for GET /events
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// Only stream events for this match
    pub match_id: Option<String>,
}

/// GET /events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    duel_common::sse::create_event_sse_stream(ctx.hub.events(), query.match_id)
}
