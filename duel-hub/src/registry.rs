//! Match Registry
//!
//! Authoritative in-memory state of every match, keyed by match id. The
//! registry is an ordinary value owned by whoever constructs it (the hub in
//! production, each test on its own), never a process-wide singleton.
//!
//! Matches are created lazily on first join or submission and, unless the
//! eviction hook is driven, live for the whole process lifetime.

use duel_common::protocol::{MatchId, MatchPhase, MatchState, ResultPayload, Role};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

struct MatchEntry {
    state: MatchState,
    last_activity: Instant,
    /// Revision of the latest submission (0 before any)
    revision: u64,
}

impl MatchEntry {
    fn new(match_id: &str) -> Self {
        Self {
            state: MatchState::new(match_id),
            last_activity: Instant::now(),
            revision: 0,
        }
    }
}

/// Result of `ensure_match`
#[derive(Debug, Clone, PartialEq)]
pub struct EnsuredMatch {
    pub state: MatchState,
    /// Whether this call created the match
    pub created: bool,
}

/// Result of `record_submission`
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOutcome {
    /// Full state after the submission
    pub state: MatchState,
    /// The slot was already ready and its result was replaced
    pub replaced_previous: bool,
    /// True only for the mutation that first made both slots ready
    pub reached_both_ready: bool,
    /// Revision stamped on this mutation
    ///
    /// Revisions increase across the whole registry, so a revision seen for
    /// one incarnation of a match id is never reused after eviction.
    pub revision: u64,
}

/// In-memory store of all active matches
#[derive(Default)]
pub struct MatchRegistry {
    matches: RwLock<HashMap<MatchId, MatchEntry>>,
    last_revision: AtomicU64,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the match, creating a fresh one if absent
    pub async fn ensure_match(&self, match_id: &str) -> EnsuredMatch {
        let mut matches = self.matches.write().await;
        let created = !matches.contains_key(match_id);
        let entry = matches
            .entry(match_id.to_string())
            .or_insert_with(|| MatchEntry::new(match_id));

        if created {
            info!(match_id, "Created match");
        }

        EnsuredMatch {
            state: entry.state.clone(),
            created,
        }
    }

    /// Mark `role` ready and store its payload verbatim
    ///
    /// Creates the match if it does not exist yet. A resubmission replaces the
    /// stored payload unconditionally.
    pub async fn record_submission(
        &self,
        match_id: &str,
        role: Role,
        payload: ResultPayload,
    ) -> SubmissionOutcome {
        let mut matches = self.matches.write().await;
        let entry = matches.entry(match_id.to_string()).or_insert_with(|| {
            info!(match_id, "Created match on submission");
            MatchEntry::new(match_id)
        });

        let was_both_ready = entry.state.both_ready();
        let slot = entry.state.slot_mut(role);
        let replaced_previous = slot.ready;
        slot.ready = true;
        slot.result = Some(payload);
        entry.last_activity = Instant::now();
        // Bumped under the write lock, so revisions follow mutation order
        entry.revision = self.last_revision.fetch_add(1, Ordering::Relaxed) + 1;

        // Slots never go back to not-ready, so this fires once per match
        let reached_both_ready = entry.state.both_ready() && !was_both_ready;

        debug!(
            match_id,
            role = %role,
            replaced_previous,
            revision = entry.revision,
            phase = ?entry.state.phase(),
            "Recorded submission"
        );

        SubmissionOutcome {
            state: entry.state.clone(),
            replaced_previous,
            reached_both_ready,
            revision: entry.revision,
        }
    }

    /// Revision of the match's latest submission
    ///
    /// None when the match does not exist (never created, or evicted).
    pub async fn revision(&self, match_id: &str) -> Option<u64> {
        self.matches
            .read()
            .await
            .get(match_id)
            .map(|entry| entry.revision)
    }

    /// Current state, or None if the match was never created
    pub async fn get_state(&self, match_id: &str) -> Option<MatchState> {
        self.matches
            .read()
            .await
            .get(match_id)
            .map(|entry| entry.state.clone())
    }

    /// Derived phase (`Empty` when absent)
    pub async fn phase(&self, match_id: &str) -> MatchPhase {
        MatchPhase::of(self.get_state(match_id).await.as_ref())
    }

    pub async fn match_count(&self) -> usize {
        self.matches.read().await.len()
    }

    /// Remove matches idle for at least `ttl`, returning their ids
    pub async fn evict_idle(&self, ttl: Duration) -> Vec<MatchId> {
        self.evict_idle_as_of(Instant::now(), ttl).await
    }

    /// `evict_idle` measured against an explicit clock reading
    pub async fn evict_idle_as_of(&self, now: Instant, ttl: Duration) -> Vec<MatchId> {
        let mut matches = self.matches.write().await;
        let mut evicted: Vec<MatchId> = matches
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_activity) >= ttl)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &evicted {
            matches.remove(id);
        }
        evicted.sort();

        if !evicted.is_empty() {
            info!(count = evicted.len(), "Evicted idle matches");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_ensure_match_is_idempotent() {
        let registry = MatchRegistry::new();

        let first = registry.ensure_match("m1").await;
        assert!(first.created);
        assert_eq!(first.state, MatchState::new("m1"));

        let second = registry.ensure_match("m1").await;
        assert!(!second.created);
        assert_eq!(registry.match_count().await, 1);
    }

    #[tokio::test]
    async fn test_get_state_absent() {
        let registry = MatchRegistry::new();
        assert!(registry.get_state("nope").await.is_none());
        assert_eq!(registry.phase("nope").await, MatchPhase::Empty);
    }

    #[tokio::test]
    async fn test_submission_on_unknown_match_creates_it() {
        let registry = MatchRegistry::new();
        let outcome = registry
            .record_submission("m9", Role::Participant2, json!({"hashes2": []}))
            .await;

        assert!(outcome.state.participant2.ready);
        assert!(!outcome.state.participant1.ready);
        assert!(!outcome.reached_both_ready);
        assert_eq!(registry.phase("m9").await, MatchPhase::HalfReady);
    }

    #[tokio::test]
    async fn test_phase_walk_and_single_ready_transition() {
        let registry = MatchRegistry::new();
        registry.ensure_match("m1").await;
        assert_eq!(registry.phase("m1").await, MatchPhase::Waiting);

        let first = registry
            .record_submission("m1", Role::Participant1, json!({"n": 1}))
            .await;
        assert!(!first.reached_both_ready);
        assert_eq!(first.state.phase(), MatchPhase::HalfReady);

        let second = registry
            .record_submission("m1", Role::Participant2, json!({"n": 2}))
            .await;
        assert!(second.reached_both_ready);
        assert_eq!(second.state.phase(), MatchPhase::BothReady);

        // Resubmission keeps BOTH_READY without re-firing the transition
        let again = registry
            .record_submission("m1", Role::Participant2, json!({"n": 3}))
            .await;
        assert!(!again.reached_both_ready);
        assert!(again.replaced_previous);
        assert_eq!(again.state.phase(), MatchPhase::BothReady);
    }

    #[tokio::test]
    async fn test_revision_tracks_latest_submission() {
        let registry = MatchRegistry::new();
        registry.ensure_match("m1").await;
        assert_eq!(registry.revision("m1").await, Some(0));
        assert_eq!(registry.revision("nope").await, None);

        let first = registry
            .record_submission("m1", Role::Participant1, json!(1))
            .await;
        let other = registry
            .record_submission("m2", Role::Participant1, json!(1))
            .await;
        let second = registry
            .record_submission("m1", Role::Participant1, json!(2))
            .await;

        assert!(first.revision < other.revision);
        assert!(other.revision < second.revision);
        assert_eq!(registry.revision("m1").await, Some(second.revision));

        // Joining does not count as a mutation
        registry.ensure_match("m1").await;
        assert_eq!(registry.revision("m1").await, Some(second.revision));
    }

    #[tokio::test]
    async fn test_revision_not_reused_after_eviction() {
        let registry = MatchRegistry::new();
        let before = registry
            .record_submission("m1", Role::Participant1, json!(1))
            .await;

        let later = Instant::now() + Duration::from_secs(120);
        registry
            .evict_idle_as_of(later, Duration::from_secs(60))
            .await;
        assert_eq!(registry.revision("m1").await, None);

        let after = registry
            .record_submission("m1", Role::Participant1, json!(1))
            .await;
        assert!(after.revision > before.revision);
    }

    #[tokio::test]
    async fn test_resubmission_overwrites_payload() {
        let registry = MatchRegistry::new();
        registry
            .record_submission("m1", Role::Participant1, json!({"v": "old"}))
            .await;
        let outcome = registry
            .record_submission("m1", Role::Participant1, json!({"v": "new"}))
            .await;

        assert_eq!(outcome.state.participant1.result, Some(json!({"v": "new"})));
    }

    #[tokio::test]
    async fn test_matches_are_independent() {
        let registry = MatchRegistry::new();
        registry
            .record_submission("a", Role::Participant1, json!(1))
            .await;
        registry.ensure_match("b").await;

        assert_eq!(registry.phase("a").await, MatchPhase::HalfReady);
        assert_eq!(registry.phase("b").await, MatchPhase::Waiting);
    }

    #[tokio::test]
    async fn test_evict_idle() {
        let registry = MatchRegistry::new();
        registry.ensure_match("old").await;
        registry.ensure_match("older").await;

        // Nothing is an hour old yet
        assert!(registry.evict_idle(Duration::from_secs(3600)).await.is_empty());

        let later = Instant::now() + Duration::from_secs(120);
        let evicted = registry
            .evict_idle_as_of(later, Duration::from_secs(60))
            .await;
        assert_eq!(evicted, vec!["old".to_string(), "older".to_string()]);
        assert_eq!(registry.match_count().await, 0);
    }
}
