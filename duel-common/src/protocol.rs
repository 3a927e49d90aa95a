//! Wire protocol and match data model
//!
//! JSON messages exchanged over the duel WebSocket, plus the match state the
//! hub keeps for every duel. Result payloads are opaque here: the hub stores
//! and forwards them verbatim.
//!
//! Client → server:
//! ```text
//! { "type": "join", "matchId": "m1" }
//! { "type": "submissionResult", "matchId": "m1", "role": "user1", "payload": {...} }
//! ```
//!
//! Server → client:
//! ```text
//! { "type": "statusUpdate", "matchId": "m1",
//!   "user1": { "ready": true, "result": {...} },
//!   "user2": { "ready": false, "result": null } }
//! { "type": "bothReady", "matchId": "m1", "similarityScore": 87.5, "verdict": "high" }
//! ```

use crate::similarity::{ChunkWeight, Fingerprint, ScoringInput, SelectedMatch, SimilarityVerdict};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Caller-supplied identifier of one duel session
pub type MatchId = String;

/// Opaque result payload produced by the external analysis service
pub type ResultPayload = Value;

/// Participant role within a match
///
/// Serialized as `user1`/`user2`; `participant1`/`participant2` are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user1", alias = "participant1")]
    Participant1,
    #[serde(rename = "user2", alias = "participant2")]
    Participant2,
}

impl Role {
    pub fn all() -> [Role; 2] {
        [Role::Participant1, Role::Participant2]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Participant1 => "user1",
            Role::Participant2 => "user2",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One participant's slot in a match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSlot {
    pub ready: bool,
    pub result: Option<ResultPayload>,
}

/// Logical progress of a match, derived from its slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// No match state exists yet
    Empty,
    /// Joined, nothing submitted
    Waiting,
    /// Exactly one participant submitted
    HalfReady,
    /// Both participants submitted
    BothReady,
}

impl MatchPhase {
    /// Phase of an optional match state (absent = `Empty`)
    pub fn of(state: Option<&MatchState>) -> Self {
        state.map(MatchState::phase).unwrap_or(MatchPhase::Empty)
    }
}

/// Authoritative state of one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchState {
    pub match_id: MatchId,
    pub participant1: ParticipantSlot,
    pub participant2: ParticipantSlot,
}

impl MatchState {
    /// Fresh state with both slots empty
    pub fn new(match_id: impl Into<MatchId>) -> Self {
        Self {
            match_id: match_id.into(),
            participant1: ParticipantSlot::default(),
            participant2: ParticipantSlot::default(),
        }
    }

    pub fn slot(&self, role: Role) -> &ParticipantSlot {
        match role {
            Role::Participant1 => &self.participant1,
            Role::Participant2 => &self.participant2,
        }
    }

    pub fn slot_mut(&mut self, role: Role) -> &mut ParticipantSlot {
        match role {
            Role::Participant1 => &mut self.participant1,
            Role::Participant2 => &mut self.participant2,
        }
    }

    pub fn phase(&self) -> MatchPhase {
        match (self.participant1.ready, self.participant2.ready) {
            (true, true) => MatchPhase::BothReady,
            (false, false) => MatchPhase::Waiting,
            _ => MatchPhase::HalfReady,
        }
    }

    pub fn both_ready(&self) -> bool {
        self.phase() == MatchPhase::BothReady
    }
}

/// Rejection reasons for inbound client messages
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not JSON, unknown `type`, unknown `role`, or a missing field
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// `matchId` present but empty
    #[error("Empty matchId")]
    EmptyMatchId,

    /// Binary or other non-text frame
    #[error("Unsupported frame: {0}")]
    UnsupportedFrame(String),
}

/// Messages sent by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Attach this connection to a match room
    Join {
        #[serde(rename = "matchId")]
        match_id: MatchId,
    },

    /// A participant's analysis result
    SubmissionResult {
        #[serde(rename = "matchId")]
        match_id: MatchId,
        role: Role,
        payload: ResultPayload,
    },
}

impl ClientMessage {
    /// Parse and validate a text frame
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let message: ClientMessage = serde_json::from_str(text)?;
        if message.match_id().is_empty() {
            return Err(ProtocolError::EmptyMatchId);
        }
        Ok(message)
    }

    pub fn match_id(&self) -> &str {
        match self {
            ClientMessage::Join { match_id } => match_id,
            ClientMessage::SubmissionResult { match_id, .. } => match_id,
        }
    }
}

/// Messages pushed by the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Full snapshot of a match after any mutation
    StatusUpdate {
        #[serde(rename = "matchId")]
        match_id: MatchId,
        user1: ParticipantSlot,
        user2: ParticipantSlot,
    },

    /// Score for the latest snapshot of a match with both submissions
    ///
    /// Follows the `statusUpdate` it scores. A resubmission while both are
    /// ready is scored again and announced again.
    BothReady {
        #[serde(rename = "matchId")]
        match_id: MatchId,
        #[serde(rename = "similarityScore")]
        similarity_score: Option<f64>,
        verdict: Option<SimilarityVerdict>,
    },
}

impl ServerMessage {
    pub fn status_update(state: &MatchState) -> Self {
        ServerMessage::StatusUpdate {
            match_id: state.match_id.clone(),
            user1: state.participant1.clone(),
            user2: state.participant2.clone(),
        }
    }

    pub fn both_ready(match_id: impl Into<MatchId>, similarity_score: Option<f64>) -> Self {
        ServerMessage::BothReady {
            match_id: match_id.into(),
            similarity_score,
            verdict: similarity_score.map(SimilarityVerdict::from_score),
        }
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Request body of the HTTP scoring service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareRequest {
    pub hashes_a: Vec<Fingerprint>,
    pub hashes_b: Vec<Fingerprint>,
    #[serde(default)]
    pub code_chunks_a: Vec<ChunkWeight>,
    #[serde(default)]
    pub code_chunks_b: Vec<ChunkWeight>,
}

impl CompareRequest {
    /// Request comparing `a` against the pool `b`
    pub fn from_inputs(a: &ScoringInput, b: &ScoringInput) -> Self {
        Self {
            hashes_a: a.hashes2.clone(),
            hashes_b: b.hashes2.clone(),
            code_chunks_a: a.code_chunks.clone(),
            code_chunks_b: b.code_chunks.clone(),
        }
    }

    /// Integer weights for `hashes_a`
    pub fn weights_a(&self) -> Vec<u64> {
        self.code_chunks_a.iter().map(ChunkWeight::weight).collect()
    }
}

/// Response body of the HTTP scoring service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareResponse {
    pub status: String,
    pub similarity_score: f64,
    #[serde(default)]
    pub selected_matches: Vec<SelectedMatch>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_join() {
        let msg = ClientMessage::parse(r#"{"type":"join","matchId":"m1"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join {
                match_id: "m1".to_string()
            }
        );
    }

    #[test]
    fn test_parse_submission_accepts_both_role_spellings() {
        for (spelling, role) in [
            ("user1", Role::Participant1),
            ("participant2", Role::Participant2),
        ] {
            let text = json!({
                "type": "submissionResult",
                "matchId": "m1",
                "role": spelling,
                "payload": {"hashes2": ["01"]}
            })
            .to_string();
            match ClientMessage::parse(&text).unwrap() {
                ClientMessage::SubmissionResult { role: parsed, .. } => assert_eq!(parsed, role),
                other => panic!("unexpected message {:?}", other),
            }
        }
    }

    #[test]
    fn test_parse_rejects_bad_messages() {
        let cases = [
            "not json",
            r#"{"type":"join"}"#,
            r#"{"type":"dance","matchId":"m1"}"#,
            r#"{"type":"submissionResult","matchId":"m1","role":"user3","payload":{}}"#,
            r#"{"matchId":"m1"}"#,
        ];
        for text in cases {
            assert!(
                matches!(ClientMessage::parse(text), Err(ProtocolError::Malformed(_))),
                "accepted {}",
                text
            );
        }
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"join","matchId":""}"#),
            Err(ProtocolError::EmptyMatchId)
        ));
    }

    #[test]
    fn test_status_update_wire_shape() {
        let mut state = MatchState::new("m1");
        state.participant1 = ParticipantSlot {
            ready: true,
            result: Some(json!({"hashes2": ["01"]})),
        };

        let value = serde_json::to_value(ServerMessage::status_update(&state)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "statusUpdate",
                "matchId": "m1",
                "user1": {"ready": true, "result": {"hashes2": ["01"]}},
                "user2": {"ready": false, "result": null}
            })
        );
    }

    #[test]
    fn test_both_ready_wire_shape() {
        let value = serde_json::to_value(ServerMessage::both_ready("m1", Some(90.0))).unwrap();
        assert_eq!(value["type"], "bothReady");
        assert_eq!(value["similarityScore"], 90.0);
        assert_eq!(value["verdict"], "high");

        let unscored = serde_json::to_value(ServerMessage::both_ready("m1", None)).unwrap();
        assert!(unscored["similarityScore"].is_null());
        assert!(unscored["verdict"].is_null());
    }

    #[test]
    fn test_phase_progression() {
        let mut state = MatchState::new("m1");
        assert_eq!(MatchPhase::of(None), MatchPhase::Empty);
        assert_eq!(state.phase(), MatchPhase::Waiting);

        state.slot_mut(Role::Participant2).ready = true;
        assert_eq!(state.phase(), MatchPhase::HalfReady);

        state.slot_mut(Role::Participant1).ready = true;
        assert_eq!(MatchPhase::of(Some(&state)), MatchPhase::BothReady);
        assert!(state.both_ready());
    }

    #[test]
    fn test_compare_request_from_inputs() {
        let a = ScoringInput::from_payload(&json!({"hashes2": ["01", "10"], "code_chunks": [2, 3]}))
            .unwrap();
        let b = ScoringInput::from_payload(&json!({"hashes2": [[1, 1]]})).unwrap();

        let request = CompareRequest::from_inputs(&a, &b);
        assert_eq!(request.weights_a(), vec![2, 3]);

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["hashes_b"], json!(["11"]));
        assert_eq!(value["code_chunks_b"], json!([]));
    }
}
