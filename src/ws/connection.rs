//! WebSocket connection read/write loop.
//!
//! Each connection owns its session state and an unbounded outbound
//! channel registered with the [`crate::domain::ConnectionRegistry`].
//! Events pushed to the channel by any part of the gateway are
//! serialized and forwarded to the client here.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::session::{self, Session};
use crate::app_state::AppState;
use crate::domain::ConnectionId;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads protocol frames from the client and dispatches them.
/// - Forwards registry-routed events to the client.
/// - On exit, purges the connection and notifies its rooms.
pub async fn run_connection(socket: WebSocket, state: AppState, token: Option<String>) {
    let connection_id = ConnectionId::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.registry.attach(connection_id, tx).await;
    tracing::debug!(connection = %connection_id, "ws connection opened");

    let mut session = Session::new(connection_id);
    if let Some(token) = token {
        session::authenticate(&state, &mut session, &token).await;
    }

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // Incoming frame from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        session::handle_frame(&state, &mut session, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            // Event routed to this connection
            event = rx.recv() => {
                match event {
                    Some(event) => {
                        let json = serde_json::to_string(&event).unwrap_or_default();
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    session::terminate(&state, &session).await;
    tracing::debug!(connection = %connection_id, "ws connection closed");
}
