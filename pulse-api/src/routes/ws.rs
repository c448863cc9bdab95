//! WebSocket route handler
//!
//! Handles the upgrade, registers the connection, and runs the two halves of
//! the session: a writer task draining the per-connection frame channel and
//! a read loop parsing client commands. The registry holds the only sender
//! for the frame channel, so removing a connection (idle reap, admin
//! disconnect) closes the channel; the writer then closes the socket and the
//! read loop ends with it. Every state-touching command takes a rate-limit
//! token first; `ping` stays free so keep-alives survive a drained bucket.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use pulse_core::{ClientCommand, ErrorCode, GatewayError, ServerFrame};
use pulse_services::ConnectionId;

use crate::AppState;

/// Create WebSocket routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    debug!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    let buffer = state.registry.config().dispatch.channel_buffer;
    let (tx, mut rx) = mpsc::channel::<ServerFrame>(buffer);

    // The sender moves into the registry; replies go through `push_frame`
    // so this task never keeps the channel alive past its eviction
    let id = match state.registry.accept(tx, None) {
        Ok(id) => id,
        Err(e) => {
            let frame = error_frame(&e);
            if let Ok(text) = serde_json::to_string(&frame) {
                let _ = sink.send(Message::Text(text.into())).await;
            }
            let _ = sink.close().await;
            return;
        }
    };

    // Writer task: serialize every queued frame onto the socket; once the
    // registry drops the sender the channel drains dry and the socket is
    // closed, terminal notices (timeout, forced disconnect) included
    let mut writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to serialize outbound frame: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Read loop: parse and execute commands until the client goes away or
    // the gateway closes the session out from under us
    loop {
        tokio::select! {
            _ = &mut writer => {
                debug!("Session {} closed by the gateway", id);
                break;
            }
            next = stream.next() => {
                let Some(Ok(message)) = next else { break };
                let text = match message {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    // axum answers pings itself; ignore everything else
                    _ => continue,
                };

                let command = match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(command) => command,
                    Err(e) => {
                        debug!("Unparseable command from {}: {}", id, e);
                        let frame = ServerFrame::Error {
                            code: ErrorCode::InvalidMessage,
                            message: format!("invalid command: {}", e),
                        };
                        if state.registry.push_frame(id, frame).is_err() {
                            break;
                        }
                        continue;
                    }
                };

                if handle_command(&state, id, command).is_err() {
                    // Session vanished underneath us
                    break;
                }
            }
        }
    }

    state.registry.disconnect(id, "client_disconnect");
    writer.abort();
    info!("WebSocket session {} ended", id);
}

/// Execute one command. `Err` means the session no longer exists.
fn handle_command(state: &AppState, id: ConnectionId, command: ClientCommand) -> Result<(), ()> {
    // Keep-alives bypass the token bucket
    if matches!(command, ClientCommand::Ping) {
        let pong = ServerFrame::Pong {
            timestamp: Utc::now().timestamp_millis(),
        };
        return state.registry.push_frame(id, pong).map_err(|_| ());
    }

    match state.registry.try_consume(id) {
        Ok(true) => {}
        Ok(false) => {
            let retry = state.registry.config().rate_limit.refill_interval.as_secs();
            let frame = ServerFrame::RateLimited {
                retry_after_secs: retry,
            };
            return state.registry.push_frame(id, frame).map_err(|_| ());
        }
        Err(_) => return Err(()),
    }

    let result = match command {
        ClientCommand::Subscribe { types, filters } => state
            .registry
            .subscribe(id, &types, filters)
            .map(|outcome| ServerFrame::Subscribed {
                types: outcome.accepted,
                filters: outcome.filters,
                active_subscriptions: outcome.active,
            }),
        ClientCommand::Unsubscribe { types } => state
            .registry
            .unsubscribe(id, &types)
            .map(|outcome| ServerFrame::Unsubscribed {
                types: outcome.removed,
                active_subscriptions: outcome.active,
            }),
        ClientCommand::UpdateFilters { filters } => state
            .registry
            .update_filters(id, filters)
            .map(|filters| ServerFrame::FiltersUpdated { filters }),
        ClientCommand::GetStatus => {
            state.registry.status(id).map(|snapshot| ServerFrame::Status {
                snapshot,
                total_clients: state.registry.len(),
            })
        }
        ClientCommand::Ping => unreachable!("handled above"),
    };

    let frame = match result {
        Ok(frame) => frame,
        Err(GatewayError::InvalidSession(_)) => return Err(()),
        Err(e) => error_frame(&e),
    };
    state.registry.push_frame(id, frame).map_err(|_| ())
}

fn error_frame(e: &GatewayError) -> ServerFrame {
    let code = match e {
        GatewayError::CapacityExceeded { .. } => ErrorCode::CapacityExceeded,
        GatewayError::InvalidSession(_) => ErrorCode::InvalidSession,
        GatewayError::RateLimited => ErrorCode::RateLimited,
        GatewayError::NoValidTopics => ErrorCode::NoValidTopics,
        GatewayError::Analytics(_) | GatewayError::Internal(_) => ErrorCode::InternalError,
    };
    ServerFrame::Error {
        code,
        message: e.to_string(),
    }
}
