//! WebSocket handler: pushes the board snapshot as JSON text.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade -> send the current snapshot
//! 2. Every snapshot change -> send it again
//! 3. Client close, send failure, or board stop -> end the connection
//!
//! Anything the client sends other than Close is ignored.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tracing::{info, warn};
use uuid::Uuid;

use crate::layout::BoardSnapshot;
use crate::state::AppState;

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();
    let mut snapshots = state.board.subscribe();

    let initial = snapshots.borrow_and_update().clone();
    if send_snapshot(&mut socket, &initial).await.is_err() {
        return;
    }
    info!(%client_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                if let Message::Close(_) = msg {
                    break;
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if send_snapshot(&mut socket, &snapshot).await.is_err() {
                    break;
                }
            }
        }
    }

    info!(%client_id, "ws: client disconnected");
}

async fn send_snapshot(socket: &mut WebSocket, snapshot: &BoardSnapshot) -> Result<(), ()> {
    let text = match serde_json::to_string(snapshot) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "ws: snapshot serialization failed");
            return Err(());
        }
    };
    socket.send(Message::Text(text.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
