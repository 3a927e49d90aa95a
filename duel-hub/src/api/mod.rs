//! HTTP and WebSocket API for duel-hub

pub mod handlers;
pub mod server;
pub mod sse;
pub mod ws;

pub use server::{create_router, AppContext};
