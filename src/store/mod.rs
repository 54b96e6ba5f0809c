//! Device record store: the capability presence updates are written through.
//!
//! DESIGN
//! ======
//! `RecordStore` is the seam between presence logic and persistence. The
//! updater only ever asks for "update records matching a filter by merging
//! in given fields", so both backends implement the same narrow surface:
//! - `PgDeviceStore`: the `devices` table in Postgres.
//! - `MemoryDeviceStore`: a map behind a `RwLock`, used by tests and by the
//!   `memory` backend for single-node deployments.

pub mod memory;
pub mod postgres;

use serde::{Deserialize, Serialize};

pub use memory::MemoryDeviceStore;
pub use postgres::PgDeviceStore;

// =============================================================================
// DEVICE RECORD
// =============================================================================

/// Presence state of one device. Mirrors the `devices` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_id: String,
    /// Socket identifier of the most recent connection.
    pub connection_id: Option<String>,
    pub online: bool,
    /// Last connect or heartbeat, milliseconds since Unix epoch.
    pub last_seen_ms: i64,
}

// =============================================================================
// FILTER / PATCH
// =============================================================================

/// Selects which records an update or lookup applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFilter {
    ConnectionId(String),
    DeviceId(String),
    /// Records currently marked online.
    Online,
    /// Records currently marked offline.
    Offline,
    All,
}

impl DeviceFilter {
    #[must_use]
    pub fn matches(&self, record: &DeviceRecord) -> bool {
        match self {
            Self::ConnectionId(id) => record.connection_id.as_deref() == Some(id.as_str()),
            Self::DeviceId(id) => record.device_id == *id,
            Self::Online => record.online,
            Self::Offline => !record.online,
            Self::All => true,
        }
    }
}

/// Fields merged into every matching record. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevicePatch {
    pub online: Option<bool>,
    pub last_seen_ms: Option<i64>,
}

impl DevicePatch {
    #[must_use]
    pub fn offline() -> Self {
        Self { online: Some(false), ..Self::default() }
    }

    #[must_use]
    pub fn seen_at(ts_ms: i64) -> Self {
        Self { last_seen_ms: Some(ts_ms), ..Self::default() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.online.is_none() && self.last_seen_ms.is_none()
    }

    pub fn apply(&self, record: &mut DeviceRecord) {
        if let Some(online) = self.online {
            record.online = online;
        }
        if let Some(ts) = self.last_seen_ms {
            record.last_seen_ms = ts;
        }
    }
}

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        true
    }
}

// =============================================================================
// TRAIT
// =============================================================================

/// Device-records store used by the presence service.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Merge `patch` into every record matching `filter`.
    ///
    /// Returns the number of records updated. Zero matches is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend cannot be reached.
    async fn update_where(&self, filter: &DeviceFilter, patch: &DevicePatch) -> Result<u64, StoreError>;

    /// Insert a record, replacing any existing record with the same `device_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend cannot be reached.
    async fn upsert(&self, record: &DeviceRecord) -> Result<(), StoreError>;

    /// Return every record matching `filter`, ordered by `device_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend cannot be reached.
    async fn find(&self, filter: &DeviceFilter) -> Result<Vec<DeviceRecord>, StoreError>;
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
