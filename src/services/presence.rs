//! Presence service: records devices online on connect, offline on disconnect.
//!
//! DESIGN
//! ======
//! Every write goes through `RecordStore::update_where` or `upsert`. A device
//! is recorded online under a freshly minted connection id; disconnect marks
//! offline whichever record still carries that connection id. A device that
//! has already reconnected holds a newer id, so a late disconnect from the old
//! socket matches nothing and the device stays online.
//!
//! ERROR HANDLING
//! ==============
//! A disconnect that matches no record is not an error. Store failures are
//! returned to the caller; the socket layer logs them and moves on, there is
//! no retry.

use std::fmt::Write;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info};

use crate::frame::now_ms;
use crate::store::{DeviceFilter, DevicePatch, DeviceRecord, RecordStore, StoreError};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("connection id must not be empty")]
    InvalidConnectionId,
    #[error("device id must not be empty")]
    InvalidDeviceId,
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl crate::frame::ErrorCode for PresenceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConnectionId => "E_INVALID_CONNECTION_ID",
            Self::InvalidDeviceId => "E_INVALID_DEVICE_ID",
            Self::DeviceNotFound(_) => "E_DEVICE_NOT_FOUND",
            Self::Store(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.retryable(),
            _ => false,
        }
    }
}

// =============================================================================
// CONNECTION IDS
// =============================================================================

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Mint a random 16-byte hex connection id.
#[must_use]
pub fn generate_connection_id() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes_to_hex(&bytes)
}

// =============================================================================
// UPDATER
// =============================================================================

#[derive(Clone)]
pub struct PresenceUpdater {
    store: Arc<dyn RecordStore>,
}

impl PresenceUpdater {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Record that the device connected over `connection_id` is offline.
    ///
    /// Only `online` is written, so repeating the call is idempotent. No
    /// matching record is a silent no-op.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty connection id or a store failure.
    pub async fn mark_offline(&self, connection_id: &str) -> Result<(), PresenceError> {
        if connection_id.is_empty() {
            return Err(PresenceError::InvalidConnectionId);
        }

        let filter = DeviceFilter::ConnectionId(connection_id.to_string());
        let updated = self
            .store
            .update_where(&filter, &DevicePatch::offline())
            .await?;

        if updated == 0 {
            debug!(%connection_id, "presence: offline matched no device");
        } else {
            info!(%connection_id, updated, "presence: device offline");
        }
        Ok(())
    }

    /// Record `device_id` online under a new connection id and return that id.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty device id or a store failure.
    pub async fn mark_online(&self, device_id: &str) -> Result<String, PresenceError> {
        if device_id.is_empty() {
            return Err(PresenceError::InvalidDeviceId);
        }

        let connection_id = generate_connection_id();
        let record = DeviceRecord {
            device_id: device_id.to_string(),
            connection_id: Some(connection_id.clone()),
            online: true,
            last_seen_ms: now_ms(),
        };
        self.store.upsert(&record).await?;

        info!(%device_id, %connection_id, "presence: device online");
        Ok(connection_id)
    }

    /// Refresh `last_seen_ms` for the device on `connection_id`.
    ///
    /// Returns whether a record matched.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty connection id or a store failure.
    pub async fn touch(&self, connection_id: &str) -> Result<bool, PresenceError> {
        if connection_id.is_empty() {
            return Err(PresenceError::InvalidConnectionId);
        }

        let filter = DeviceFilter::ConnectionId(connection_id.to_string());
        let updated = self
            .store
            .update_where(&filter, &DevicePatch::seen_at(now_ms()))
            .await?;
        Ok(updated > 0)
    }

    /// Mark every online device offline. Returns how many were changed.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure.
    pub async fn reset_all(&self) -> Result<u64, PresenceError> {
        let updated = self
            .store
            .update_where(&DeviceFilter::Online, &DevicePatch::offline())
            .await?;
        info!(updated, "presence: reset all devices offline");
        Ok(updated)
    }

    /// List devices, optionally restricted to one online state.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure.
    pub async fn list(&self, online: Option<bool>) -> Result<Vec<DeviceRecord>, PresenceError> {
        let filter = match online {
            Some(true) => DeviceFilter::Online,
            Some(false) => DeviceFilter::Offline,
            None => DeviceFilter::All,
        };
        Ok(self.store.find(&filter).await?)
    }

    /// Look up a single device.
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotFound` if no record exists, or a store failure.
    pub async fn get(&self, device_id: &str) -> Result<DeviceRecord, PresenceError> {
        if device_id.is_empty() {
            return Err(PresenceError::InvalidDeviceId);
        }

        self.store
            .find(&DeviceFilter::DeviceId(device_id.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PresenceError::DeviceNotFound(device_id.to_string()))
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
