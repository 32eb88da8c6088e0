//! WebSocket plumbing: upgrade, role assignment by route, and the two tasks
//! per connection — a writer draining the per-client channel and a reader
//! feeding the dispatcher's event queue.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::server::router::ServerEvent;
use crate::server::session::{ClientHandle, Role};
use crate::server::state::AppState;

pub async fn ws_desktop(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, Role::Desktop))
}

pub async fn ws_remote(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, Role::Remote))
}

async fn handle_socket(socket: WebSocket, state: AppState, role: Role) {
    let id = state.next_client_id();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let handle = ClientHandle::new(id, role, tx);
    if state.events.send(ServerEvent::Connected(handle)).is_err() {
        return; // dispatcher gone, server shutting down
    }

    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(Message::Text(message.into())).await.is_err() {
                break;
            }
        }
    });

    let events = state.events.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            if let Message::Text(text) = message {
                let event = ServerEvent::Inbound {
                    from: id,
                    raw: text.to_string(),
                };
                if events.send(event).is_err() {
                    break;
                }
            }
        }
    });

    // either side closing tears down the connection
    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }
    let _ = state.events.send(ServerEvent::Disconnected(id));
}
