//! WebSocket handler for live notifications.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::api::{ApiState, CurrentUser};
use crate::model::User;

/// WebSocket upgrade handler.
pub async fn handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ApiState>>,
    CurrentUser(user): CurrentUser,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

/// Forward the user's notifications until either side goes away.
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>, user: User) {
    let (mut sender, mut receiver) = socket.split();
    let mut notifications = state.notifier.subscribe();

    tracing::debug!(user_id = user.id, "WebSocket client connected");

    loop {
        tokio::select! {
            received = notifications.recv() => match received {
                Ok(notification) => {
                    if !notification.is_for(&user) {
                        continue;
                    }
                    let Ok(json) = serde_json::to_string(&notification) else {
                        continue;
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(user_id = user.id, missed, "WebSocket client lagging");
                }
                Err(RecvError::Closed) => break,
            },

            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!(user_id = user.id, "WebSocket client disconnected");
                    break;
                }
                Some(Err(e)) => {
                    tracing::warn!("WebSocket error: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }
}
