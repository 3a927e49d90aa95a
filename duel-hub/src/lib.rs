//! # Code Duel Hub (duel-hub)
//!
//! Real-time coordinator for two-participant code duels.
//!
//! **Purpose:** Accept WebSocket connections, group them into match rooms,
//! record each participant's submitted result and push a fresh match
//! snapshot to every observer after each change. When both participants
//! are ready the match is scored once and the room is told.
//!
//! **Architecture:** registry (match state) → hub (rooms and fan-out) →
//! scorer (inline engine or remote duel-sc service), exposed over axum.

pub mod api;
pub mod error;
pub mod hub;
pub mod registry;
pub mod scorer;

pub use error::{ApiError, ApiResult};
pub use hub::{spawn_eviction_task, ConnectionId, SessionHub};
pub use registry::MatchRegistry;
pub use scorer::Scorer;
