//! Event types for the duel event system
//!
//! Provides the shared `DuelEvent` enum and the `EventBus` that fans
//! events out to in-process subscribers (the SSE stream, tests, monitors).
//! Room broadcasts to WebSocket clients do NOT go through the bus; they are
//! sent directly by the Session Hub so they stay ordered per match.

use crate::protocol::{MatchId, MatchPhase, Role};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Duel event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DuelEvent {
    /// A WebSocket connection was accepted
    ConnectionOpened {
        connection_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A WebSocket connection went away
    ConnectionClosed {
        connection_id: Uuid,
        /// Match the connection was observing, if any
        match_id: Option<MatchId>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A connection joined a match room
    ///
    /// Triggers:
    /// - SSE: update room occupancy views
    MatchJoined {
        match_id: MatchId,
        connection_id: Uuid,
        /// Whether this join created the match
        created: bool,
        /// Connections in the room after the join
        room_size: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A participant submitted (or resubmitted) a result
    SubmissionRecorded {
        match_id: MatchId,
        role: Role,
        /// Phase after the submission was applied
        phase: MatchPhase,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A ready match was scored and its room told
    ///
    /// Emitted for every delivered `bothReady`; superseded scores are not reported.
    MatchReady {
        match_id: MatchId,
        /// None when the payloads could not be scored
        similarity_score: Option<f64>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Idle matches were removed by the eviction sweep
    MatchesEvicted {
        match_ids: Vec<MatchId>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl DuelEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            DuelEvent::ConnectionOpened { .. } => "ConnectionOpened",
            DuelEvent::ConnectionClosed { .. } => "ConnectionClosed",
            DuelEvent::MatchJoined { .. } => "MatchJoined",
            DuelEvent::SubmissionRecorded { .. } => "SubmissionRecorded",
            DuelEvent::MatchReady { .. } => "MatchReady",
            DuelEvent::MatchesEvicted { .. } => "MatchesEvicted",
        }
    }

    /// Match this event concerns, if any
    pub fn match_id(&self) -> Option<&str> {
        match self {
            DuelEvent::ConnectionOpened { .. } | DuelEvent::MatchesEvicted { .. } => None,
            DuelEvent::ConnectionClosed { match_id, .. } => match_id.as_deref(),
            DuelEvent::MatchJoined { match_id, .. }
            | DuelEvent::SubmissionRecorded { match_id, .. }
            | DuelEvent::MatchReady { match_id, .. } => Some(match_id),
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged subscribers lose the oldest events instead of stalling the hub
///
/// # Examples
///
/// ```
/// use duel_common::events::{DuelEvent, EventBus};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(DuelEvent::MatchesEvicted {
///     match_ids: vec!["m1".to_string()],
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "MatchesEvicted");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DuelEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<DuelEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` when nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: DuelEvent,
    ) -> Result<usize, broadcast::error::SendError<DuelEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: DuelEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
