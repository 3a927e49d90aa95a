//! Duel WebSocket endpoint
//!
//! Each socket is split in two: this task reads frames and feeds them to
//! the hub, a spawned writer drains the connection's outbound queue.

use super::server::AppContext;
use crate::hub::SessionHub;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use duel_common::protocol::ProtocolError;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// GET /ws - upgrade to the duel protocol
pub async fn ws_handler(ws: WebSocketUpgrade, State(ctx): State<AppContext>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx.hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<SessionHub>) {
    let (connection_id, mut outbound) = hub.on_connection_opened().await;
    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!(%connection_id, error = %e, "Failed to encode outbound message");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                // Peer is gone; the reader side will notice and clean up
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => hub.on_message(connection_id, &text).await,
            Ok(Message::Binary(bytes)) => {
                let rejected =
                    ProtocolError::UnsupportedFrame(format!("{} binary bytes", bytes.len()));
                warn!(%connection_id, error = %rejected, "Dropping frame");
            }
            Ok(Message::Close(_)) => break,
            // Ping/pong are answered by the transport
            Ok(_) => {}
            Err(e) => {
                debug!(%connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    hub.on_connection_closed(connection_id).await;
    writer.abort();
}
