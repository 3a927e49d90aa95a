//! HTTP API handlers for duel-sc

pub mod compare;
pub mod health;

pub use compare::compare_hashes;
pub use health::health_routes;
