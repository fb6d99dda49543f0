//! WebSocket handler for live log viewers.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::coordinator::StreamCoordinator;
use crate::error::{StreamError, StreamResult};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::StreamState;

/// Handle WebSocket upgrade request for /ws.
pub async fn ws_upgrade(
    State(state): State<Arc<StreamState>>,
    ws: WebSocketUpgrade,
) -> Result<Response, StreamError> {
    if !state.add_ws_connection() {
        let current = state.ws_connection_count();
        let max = state.config().max_ws_connections;
        return Err(StreamError::TooManyConnections(current, max));
    }

    Ok(ws.on_upgrade(move |socket| handle_ws_connection(socket, state)))
}

/// Handle an active WebSocket connection.
async fn handle_ws_connection(socket: WebSocket, state: Arc<StreamState>) {
    let coordinator = Arc::clone(state.coordinator());
    let (session_id, outbound) = coordinator.connect();
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        if let Err(e) = forward_messages(&mut sender, outbound).await {
            debug!(session_id = %session_id, error = %e, "WebSocket send failed");
        }
    });

    let recv_coordinator = Arc::clone(&coordinator);
    let mut recv_task = tokio::spawn(async move {
        handle_incoming_messages(&mut receiver, &recv_coordinator, session_id).await;
    });

    tokio::select! {
        _ = &mut send_task => {
            debug!(session_id = %session_id, "WebSocket send task completed");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            debug!(session_id = %session_id, "WebSocket receive task completed");
            send_task.abort();
        }
    }

    coordinator.disconnect(session_id);
    state.remove_ws_connection();
}

/// Write queued messages to the socket until the queue closes or a write fails.
async fn forward_messages(
    sender: &mut SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<ServerMessage>,
) -> StreamResult<()> {
    while let Some(message) = outbound.recv().await {
        match message.to_json() {
            Ok(json) => sender.send(Message::Text(json.into())).await?,
            Err(e) => {
                warn!(error = %e, message = message.kind(), "Failed to serialize message");
            }
        }
    }
    sender.close().await?;
    Ok(())
}

/// Handle incoming WebSocket messages.
async fn handle_incoming_messages(
    receiver: &mut SplitStream<WebSocket>,
    coordinator: &StreamCoordinator,
    session_id: Uuid,
) {
    while let Some(msg_result) = receiver.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match ClientMessage::parse(text.as_str()) {
                Ok(ClientMessage::SetSearch(query)) => {
                    if let Err(e) = coordinator.set_query(session_id, query) {
                        debug!(session_id = %session_id, error = %e, "Search reply not delivered");
                        break;
                    }
                }
                Err(e) => {
                    debug!(
                        session_id = %session_id,
                        error = %e,
                        "Ignoring malformed client message"
                    );
                }
            },
            Ok(Message::Close(_)) => {
                debug!(session_id = %session_id, "Received close frame");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(Message::Binary(_)) => {
                debug!(session_id = %session_id, "Received binary message (ignored)");
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }
}
