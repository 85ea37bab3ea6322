//! WebSocket streaming of simulation events.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use crate::publisher::EventEnvelope;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct StreamQuery {
    mission_id: Option<String>,
    drone_id: Option<String>,
}

impl StreamQuery {
    fn matches(&self, envelope: &EventEnvelope) -> bool {
        if let Some(mission_id) = self.mission_id.as_deref() {
            if envelope.mission_id() != mission_id {
                return false;
            }
        }
        if let Some(drone_id) = self.drone_id.as_deref() {
            if envelope.drone_id() != drone_id {
                return false;
            }
        }
        true
    }
}

/// Handler for WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<StreamQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, filter))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, filter: StreamQuery) {
    let mut rx = state.publisher().subscribe();

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }
            event = rx.recv() => {
                match event {
                    Ok(envelope) => {
                        if !filter.matches(&envelope) {
                            continue;
                        }
                        if socket.send(Message::Text(envelope.payload.as_ref().to_owned())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Next telemetry supersedes what was dropped
                        tracing::debug!("Stream subscriber lagged by {} events", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
}
