use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AppState;

/// Per-trip live feed. One broadcast channel backs every connection; the
/// trip-id filter below is what scopes each socket to its room.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(trip_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, trip_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, trip_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    let events = BroadcastStream::new(state.events.subscribe());

    info!(%trip_id, "dashboard client subscribed");

    let send_task = tokio::spawn(async move {
        let mut events = events;
        while let Some(result) = events.next().await {
            let event = match result {
                Ok(event) => event,
                // Lagged receivers skip ahead; dashboards re-sync on the next event.
                Err(_) => continue,
            };
            if event.trip_id != trip_id {
                continue;
            }

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize trip event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(%trip_id, "dashboard client disconnected");
}
