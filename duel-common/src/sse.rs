//! Server-Sent Events (SSE) utilities
//!
//! Turns an `EventBus` subscription into an SSE response stream.

use crate::events::{DuelEvent, EventBus};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

/// Interval between keep-alive comments on idle streams
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Stream every `DuelEvent` on the bus, optionally only those for one match
///
/// Lagged subscribers skip the events they missed; the stream stays open.
pub fn create_event_sse_stream(
    bus: &EventBus,
    match_filter: Option<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(filter = ?match_filter, "New SSE client connected");

    let stream = BroadcastStream::new(bus.subscribe()).filter_map(move |result| {
        let keep = match (&result, &match_filter) {
            (Ok(event), Some(wanted)) => event_matches(event, wanted),
            _ => true,
        };
        async move {
            match result {
                Ok(event) if keep => to_sse_event(&event),
                Ok(_) => None,
                Err(e) => {
                    warn!("SSE stream error: {:?}", e);
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

/// Whether a filtered stream should carry this event
///
/// Eviction events pass when they name the wanted match.
fn event_matches(event: &DuelEvent, wanted: &str) -> bool {
    match event {
        DuelEvent::MatchesEvicted { match_ids, .. } => match_ids.iter().any(|id| id == wanted),
        _ => event.match_id() == Some(wanted),
    }
}

fn to_sse_event(event: &DuelEvent) -> Option<Result<Event, Infallible>> {
    match serde_json::to_string(event) {
        Ok(json) => {
            let event_type = event.event_type();
            debug!("Broadcasting SSE event: {}", event_type);
            Some(Ok(Event::default().event(event_type).data(json)))
        }
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_event_filter() {
        let opened = DuelEvent::ConnectionOpened {
            connection_id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
        };
        let ready = DuelEvent::MatchReady {
            match_id: "m1".to_string(),
            similarity_score: Some(100.0),
            timestamp: chrono::Utc::now(),
        };
        let evicted = DuelEvent::MatchesEvicted {
            match_ids: vec!["m2".to_string()],
            timestamp: chrono::Utc::now(),
        };

        assert!(!event_matches(&opened, "m1"));
        assert!(event_matches(&ready, "m1"));
        assert!(!event_matches(&ready, "m2"));
        assert!(event_matches(&evicted, "m2"));
        assert!(!event_matches(&evicted, "m1"));
    }
}
