//! Session Hub
//!
//! Tracks live connections, indexes them by the match room they joined, and
//! pushes a `statusUpdate` to every connection in a room after each registry
//! mutation.
//!
//! Ordering: a registry mutation and the fan-out it triggers run while the
//! room lock is held, so every connection in a room observes snapshots in
//! mutation order. Outbound sends are non-blocking channel pushes; the
//! per-connection writer task does the socket I/O, so a slow peer never
//! stalls other matches.
//!
//! Every submission that leaves a match BOTH_READY is scored and announced
//! with `bothReady`. Scoring runs outside the lock; the announcement is
//! only sent if no newer submission landed meanwhile, so a score always
//! describes the latest snapshot the room has seen.

use crate::registry::MatchRegistry;
use crate::scorer::Scorer;
use duel_common::events::{DuelEvent, EventBus};
use duel_common::protocol::{ClientMessage, MatchId, MatchState, ResultPayload, Role, ServerMessage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identifier of one live connection
pub type ConnectionId = Uuid;

/// Outbound half of a connection's message queue
pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

struct ConnectionEntry {
    sender: Outbound,
    match_id: Option<MatchId>,
}

#[derive(Default)]
struct Rooms {
    /// match id → members of that room
    by_match: HashMap<MatchId, HashMap<ConnectionId, Outbound>>,
    /// every live connection, joined or not
    connections: HashMap<ConnectionId, ConnectionEntry>,
}

impl Rooms {
    /// Move a connection into `match_id`'s room, leaving any previous room
    fn attach(&mut self, connection_id: ConnectionId, match_id: &str) -> bool {
        let Some(entry) = self.connections.get_mut(&connection_id) else {
            return false;
        };

        if let Some(previous) = entry.match_id.replace(match_id.to_string()) {
            if previous != match_id {
                remove_member(&mut self.by_match, &previous, connection_id);
            }
        }

        self.by_match
            .entry(match_id.to_string())
            .or_default()
            .insert(connection_id, entry.sender.clone());
        true
    }

    fn detach(&mut self, connection_id: ConnectionId) -> Option<ConnectionEntry> {
        let entry = self.connections.remove(&connection_id)?;
        if let Some(match_id) = &entry.match_id {
            remove_member(&mut self.by_match, match_id, connection_id);
        }
        Some(entry)
    }

    fn room_size(&self, match_id: &str) -> usize {
        self.by_match.get(match_id).map_or(0, HashMap::len)
    }

    /// Best-effort send to every member; returns how many accepted the message
    fn fan_out(&self, match_id: &str, message: &ServerMessage) -> usize {
        let Some(members) = self.by_match.get(match_id) else {
            return 0;
        };

        let mut delivered = 0;
        for (connection_id, sender) in members {
            if sender.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(%connection_id, match_id, "Dropping send to closing connection");
            }
        }
        delivered
    }
}

fn remove_member(
    by_match: &mut HashMap<MatchId, HashMap<ConnectionId, Outbound>>,
    match_id: &str,
    connection_id: ConnectionId,
) {
    if let Some(members) = by_match.get_mut(match_id) {
        members.remove(&connection_id);
        if members.is_empty() {
            by_match.remove(match_id);
        }
    }
}

/// Connection manager and room broadcaster
pub struct SessionHub {
    registry: Arc<MatchRegistry>,
    scorer: Scorer,
    events: EventBus,
    rooms: Mutex<Rooms>,
}

impl SessionHub {
    pub fn new(registry: Arc<MatchRegistry>, scorer: Scorer, events: EventBus) -> Self {
        Self {
            registry,
            scorer,
            events,
            rooms: Mutex::new(Rooms::default()),
        }
    }

    pub fn registry(&self) -> &Arc<MatchRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Register a new, not-yet-joined connection
    ///
    /// Returns its id and the receiver its writer task drains.
    pub async fn on_connection_opened(
        &self,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let connection_id = Uuid::new_v4();
        let (sender, receiver) = mpsc::unbounded_channel();

        self.rooms.lock().await.connections.insert(
            connection_id,
            ConnectionEntry {
                sender,
                match_id: None,
            },
        );

        info!(%connection_id, "Client connected");
        self.events.emit_lossy(DuelEvent::ConnectionOpened {
            connection_id,
            timestamp: chrono::Utc::now(),
        });

        (connection_id, receiver)
    }

    /// Handle one inbound text frame
    ///
    /// Malformed frames are logged and dropped; the connection stays open.
    pub async fn on_message(&self, connection_id: ConnectionId, text: &str) {
        match ClientMessage::parse(text) {
            Ok(message) => self.handle_message(connection_id, message).await,
            Err(e) => {
                warn!(%connection_id, error = %e, "Dropping malformed message");
            }
        }
    }

    /// Dispatch a parsed client message
    pub async fn handle_message(&self, connection_id: ConnectionId, message: ClientMessage) {
        match message {
            ClientMessage::Join { match_id } => self.join(connection_id, &match_id).await,
            ClientMessage::SubmissionResult {
                match_id,
                role,
                payload,
            } => self.submit(connection_id, &match_id, role, payload).await,
        }
    }

    async fn join(&self, connection_id: ConnectionId, match_id: &str) {
        let mut rooms = self.rooms.lock().await;
        if !rooms.attach(connection_id, match_id) {
            warn!(%connection_id, match_id, "Join from unknown connection dropped");
            return;
        }

        let ensured = self.registry.ensure_match(match_id).await;
        let room_size = rooms.room_size(match_id);
        rooms.fan_out(match_id, &ServerMessage::status_update(&ensured.state));
        drop(rooms);

        info!(%connection_id, match_id, room_size, "Client joined match");
        self.events.emit_lossy(DuelEvent::MatchJoined {
            match_id: match_id.to_string(),
            connection_id,
            created: ensured.created,
            room_size,
            timestamp: chrono::Utc::now(),
        });
    }

    async fn submit(
        &self,
        connection_id: ConnectionId,
        match_id: &str,
        role: Role,
        payload: ResultPayload,
    ) {
        let rooms = self.rooms.lock().await;
        let outcome = self.registry.record_submission(match_id, role, payload).await;
        let delivered = rooms.fan_out(match_id, &ServerMessage::status_update(&outcome.state));
        drop(rooms);

        info!(
            %connection_id,
            match_id,
            role = %role,
            replaced_previous = outcome.replaced_previous,
            delivered,
            "Received submission result"
        );
        self.events.emit_lossy(DuelEvent::SubmissionRecorded {
            match_id: match_id.to_string(),
            role,
            phase: outcome.state.phase(),
            timestamp: chrono::Utc::now(),
        });

        if outcome.reached_both_ready {
            info!(match_id, "Match is ready for scoring");
        }
        if outcome.state.both_ready() {
            self.announce_ready(&outcome.state, outcome.revision).await;
        }
    }

    /// Score a ready snapshot and tell its room
    ///
    /// Scoring may be a network round trip, so it runs outside the room lock.
    /// The announcement is dropped when `revision` is no longer the match's
    /// latest: the newer submission announces its own score.
    async fn announce_ready(&self, state: &MatchState, revision: u64) {
        let similarity_score = match self.scorer.score_match(state).await {
            Ok(score) => {
                info!(match_id = %state.match_id, score, "Match scored");
                Some(score)
            }
            Err(e) => {
                warn!(match_id = %state.match_id, error = %e, "Could not score ready match");
                None
            }
        };

        let message = ServerMessage::both_ready(state.match_id.clone(), similarity_score);
        let rooms = self.rooms.lock().await;
        // Mutations hold the room lock, so none can land between check and send
        if self.registry.revision(&state.match_id).await != Some(revision) {
            debug!(match_id = %state.match_id, revision, "Dropping superseded score");
            return;
        }
        rooms.fan_out(&state.match_id, &message);
        drop(rooms);

        self.events.emit_lossy(DuelEvent::MatchReady {
            match_id: state.match_id.clone(),
            similarity_score,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Forget a connection; match state is untouched
    pub async fn on_connection_closed(&self, connection_id: ConnectionId) {
        let entry = self.rooms.lock().await.detach(connection_id);
        let Some(entry) = entry else {
            debug!(%connection_id, "Close for unknown connection");
            return;
        };

        info!(%connection_id, match_id = ?entry.match_id, "Client disconnected");
        self.events.emit_lossy(DuelEvent::ConnectionClosed {
            connection_id,
            match_id: entry.match_id,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Push the current snapshot of `match_id` to its room
    ///
    /// Returns the number of connections the message was queued for.
    pub async fn broadcast(&self, match_id: &str) -> usize {
        let rooms = self.rooms.lock().await;
        match self.registry.get_state(match_id).await {
            Some(state) => rooms.fan_out(match_id, &ServerMessage::status_update(&state)),
            None => 0,
        }
    }

    pub async fn room_size(&self, match_id: &str) -> usize {
        self.rooms.lock().await.room_size(match_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.rooms.lock().await.connections.len()
    }

    /// Evict idle matches and detach their rooms
    ///
    /// Connections in an evicted room stay open but become inert until they
    /// join again.
    pub async fn evict_idle(&self, ttl: Duration) -> Vec<MatchId> {
        let mut rooms = self.rooms.lock().await;
        let evicted = self.registry.evict_idle(ttl).await;

        for match_id in &evicted {
            if let Some(members) = rooms.by_match.remove(match_id) {
                for connection_id in members.keys() {
                    if let Some(entry) = rooms.connections.get_mut(connection_id) {
                        entry.match_id = None;
                    }
                }
            }
        }
        drop(rooms);

        if !evicted.is_empty() {
            self.events.emit_lossy(DuelEvent::MatchesEvicted {
                match_ids: evicted.clone(),
                timestamp: chrono::Utc::now(),
            });
        }
        evicted
    }
}

/// Periodically evict matches idle for longer than `ttl`
pub fn spawn_eviction_task(
    hub: Arc<SessionHub>,
    ttl: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    info!(ttl_secs = ttl.as_secs(), "Match eviction enabled");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = hub.evict_idle(ttl).await;
            if !evicted.is_empty() {
                debug!(?evicted, "Eviction sweep");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hub() -> SessionHub {
        SessionHub::new(
            Arc::new(MatchRegistry::new()),
            Scorer::inline(),
            EventBus::new(100),
        )
    }

    fn join(match_id: &str) -> String {
        json!({"type": "join", "matchId": match_id}).to_string()
    }

    #[tokio::test]
    async fn test_rejoin_moves_connection_between_rooms() {
        let hub = hub();
        let (conn, mut rx) = hub.on_connection_opened().await;

        hub.on_message(conn, &join("a")).await;
        hub.on_message(conn, &join("b")).await;

        assert_eq!(hub.room_size("a").await, 0);
        assert_eq!(hub.room_size("b").await, 1);

        // One snapshot per join, the second for room b
        assert!(rx.try_recv().is_ok());
        match rx.try_recv().unwrap() {
            ServerMessage::StatusUpdate { match_id, .. } => assert_eq!(match_id, "b"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejoin_same_room_is_idempotent() {
        let hub = hub();
        let (conn, _rx) = hub.on_connection_opened().await;
        hub.on_message(conn, &join("a")).await;
        hub.on_message(conn, &join("a")).await;
        assert_eq!(hub.room_size("a").await, 1);
        assert_eq!(hub.registry().match_count().await, 1);
    }

    #[tokio::test]
    async fn test_close_keeps_match_state() {
        let hub = hub();
        let (conn, _rx) = hub.on_connection_opened().await;
        hub.on_message(conn, &join("a")).await;

        hub.on_connection_closed(conn).await;

        assert_eq!(hub.room_size("a").await, 0);
        assert_eq!(hub.connection_count().await, 0);
        assert!(hub.registry().get_state("a").await.is_some());
    }

    #[tokio::test]
    async fn test_send_to_dropped_receiver_does_not_block_others() {
        let hub = hub();
        let (gone, gone_rx) = hub.on_connection_opened().await;
        let (alive, mut alive_rx) = hub.on_connection_opened().await;
        hub.on_message(gone, &join("a")).await;
        hub.on_message(alive, &join("a")).await;
        while alive_rx.try_recv().is_ok() {}

        drop(gone_rx);
        assert_eq!(hub.broadcast("a").await, 1);
        assert!(alive_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_unknown_match_sends_nothing() {
        let hub = hub();
        assert_eq!(hub.broadcast("ghost").await, 0);
    }

    #[tokio::test]
    async fn test_evict_detaches_room() {
        let hub = hub();
        let (conn, _rx) = hub.on_connection_opened().await;
        hub.on_message(conn, &join("a")).await;

        let evicted = hub.evict_idle(Duration::ZERO).await;

        assert_eq!(evicted, vec!["a".to_string()]);
        assert_eq!(hub.room_size("a").await, 0);
        // Connection survives, inert
        assert_eq!(hub.connection_count().await, 1);
    }
}
