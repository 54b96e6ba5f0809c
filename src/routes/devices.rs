//! Device presence REST routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use tracing::error;

use crate::services::presence::PresenceError;
use crate::state::AppState;
use crate::store::DeviceRecord;

#[derive(Debug, Default, Deserialize)]
pub struct ListDevicesParams {
    pub online: Option<bool>,
}

pub(crate) fn presence_error_to_status(err: &PresenceError) -> StatusCode {
    match err {
        PresenceError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
        PresenceError::InvalidConnectionId | PresenceError::InvalidDeviceId => StatusCode::BAD_REQUEST,
        PresenceError::Store(e) => {
            error!(error = %e, "devices: store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// `GET /api/devices`: list device records, optionally by online state.
pub async fn list_devices(
    State(state): State<AppState>,
    Query(params): Query<ListDevicesParams>,
) -> Result<Json<Vec<DeviceRecord>>, StatusCode> {
    state
        .presence
        .list(params.online)
        .await
        .map(Json)
        .map_err(|e| presence_error_to_status(&e))
}

/// `GET /api/devices/{device_id}`: a single device record.
pub async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceRecord>, StatusCode> {
    state
        .presence
        .get(&device_id)
        .await
        .map(Json)
        .map_err(|e| presence_error_to_status(&e))
}

#[cfg(test)]
#[path = "devices_test.rs"]
mod tests;
