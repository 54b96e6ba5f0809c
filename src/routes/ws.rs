//! WebSocket handler: one socket per connected device.
//!
//! DESIGN
//! ======
//! The socket itself is the presence signal. On upgrade the device is
//! recorded online under a fresh connection id; when the socket ends for any
//! reason (close frame, transport error, idle timeout) that connection id is
//! marked offline.
//!
//! Handler functions are pure business logic: they validate, call the
//! presence service, and return an `Outcome`. The dispatch layer turns the
//! outcome into the frame sent back to the device.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → `mark_online` → send `session:connected` with `connection_id`
//! 2. Device sends frames → dispatch → handler returns Outcome
//! 3. Close / error / idle → `mark_offline(connection_id)`

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, info, warn};

use crate::frame::{Data, Frame, Status};
use crate::services::presence::PresenceError;
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. Handlers never send frames directly.
#[derive(Debug)]
enum Outcome {
    /// Send done+data to sender.
    Reply(Data),
    /// Send empty done to sender.
    Done,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(device_id) = params.get("device_id").filter(|d| !d.is_empty()).cloned() else {
        return (StatusCode::BAD_REQUEST, "device_id required").into_response();
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, device_id))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, device_id: String) {
    let connection_id = match state.presence.mark_online(&device_id).await {
        Ok(id) => id,
        Err(e) => {
            error!(%device_id, error = %e, "ws: failed to record device online");
            return;
        }
    };

    let welcome = Frame::request("session:connected", Data::new())
        .with_device_id(device_id.clone())
        .with_data("connection_id", connection_id.clone());

    if send_frame(&mut socket, &welcome).await.is_ok() {
        info!(%device_id, %connection_id, "ws: device connected");
        relay(&mut socket, &state, &device_id, &connection_id).await;
    }

    if let Err(e) = state.presence.mark_offline(&connection_id).await {
        warn!(%device_id, %connection_id, error = %e, "ws: failed to record device offline");
    }
    info!(%device_id, %connection_id, "ws: device disconnected");
}

/// Read frames until the socket closes, errors, or goes idle.
async fn relay(socket: &mut WebSocket, state: &AppState, device_id: &str, connection_id: &str) {
    let idle = Duration::from_secs(state.config.ws_idle_timeout_secs);

    loop {
        let msg = match tokio::time::timeout(idle, socket.recv()).await {
            Ok(Some(Ok(msg))) => msg,
            Ok(Some(Err(e))) => {
                warn!(%device_id, error = %e, "ws: transport error");
                return;
            }
            Ok(None) => return,
            Err(_) => {
                info!(%device_id, idle_secs = idle.as_secs(), "ws: idle timeout");
                return;
            }
        };

        match msg {
            Message::Text(text) => {
                for frame in process_inbound_text(state, device_id, connection_id, &text).await {
                    if send_frame(socket, &frame).await.is_err() {
                        return;
                    }
                }
            }
            Message::Close(_) => return,
            _ => {}
        }
    }
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// Kept apart from the socket so tests can drive dispatch directly.
async fn process_inbound_text(state: &AppState, device_id: &str, connection_id: &str, text: &str) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%device_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new())
                .with_device_id(device_id)
                .with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    // The socket, not the payload, decides which device is talking.
    req.device_id = Some(device_id.to_string());

    let result = match req.prefix() {
        "presence" => handle_presence(state, connection_id, &req).await,
        prefix => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    match result {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Done) => vec![req.done()],
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// PRESENCE HANDLERS
// =============================================================================

async fn handle_presence(state: &AppState, connection_id: &str, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "ping" => match state.presence.touch(connection_id).await {
            Ok(_) => Ok(Outcome::Done),
            Err(e) => Err(req.error_from(&e)),
        },
        "list" => {
            let online = req
                .data
                .get("online")
                .and_then(serde_json::Value::as_bool);
            match state.presence.list(online).await {
                Ok(devices) => {
                    let mut data = Data::new();
                    data.insert("devices".into(), serde_json::to_value(&devices).unwrap_or_default());
                    Ok(Outcome::Reply(data))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "get" => {
            let Some(target) = req.data.get("device_id").and_then(|v| v.as_str()) else {
                return Err(req.error_from(&PresenceError::InvalidDeviceId));
            };
            match state.presence.get(target).await {
                Ok(device) => {
                    let mut data = Data::new();
                    data.insert("device".into(), serde_json::to_value(&device).unwrap_or_default());
                    Ok(Outcome::Reply(data))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        op => Err(req.error(format!("unknown presence op: {op}"))),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };

    if frame.status == Status::Error {
        let code = frame
            .data
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let message = frame
            .data
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }

    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
