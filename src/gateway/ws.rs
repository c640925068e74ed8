use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::AppState;

/// `GET /ws`: upgrade to WebSocket.
pub(crate) async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Per-connection WebSocket logic.  Events flow server → client only.
async fn handle_ws(mut socket: WebSocket, state: AppState) {
    let mut events_rx = state.events_tx.subscribe();

    // Sent after subscribing, so the client knows no later event is missed.
    let hello = serde_json::json!({ "type": "connected", "tools": state.tools.len() });
    if socket.send(Message::Text(hello.to_string())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events_rx.recv() => {
                match event {
                    Ok(event) => {
                        if socket.send(Message::Text(event)).await.is_err() {
                            break; // client disconnected
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "ws client lagging, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!("ws recv error: {e}");
                        break;
                    }
                    _ => {} // client frames are ignored
                }
            }
        }
    }
    debug!("ws client disconnected");
}
