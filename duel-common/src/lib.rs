//! # Code Duel Common Library
//!
//! Shared code for the duel services:
//! - Wire protocol and match data model
//! - Event types (DuelEvent enum) and EventBus
//! - Similarity Engine
//! - Configuration loading
//! - SSE helpers
//! - Graceful shutdown signal

pub mod config;
pub mod error;
pub mod events;
pub mod protocol;
pub mod shutdown;
pub mod similarity;
pub mod sse;

pub use error::{Error, Result};
pub use protocol::{
    ClientMessage, MatchId, MatchPhase, MatchState, ParticipantSlot, Role, ServerMessage,
};
pub use similarity::{Comparison, SimilarityEngine, SimilarityVerdict};
