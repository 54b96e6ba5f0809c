//! In-memory device store.
//!
//! Records live in a `BTreeMap` keyed by `device_id` so `find` returns them
//! already ordered. State is lost on restart, which matches presence
//! semantics: no socket survives a restart either.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{DeviceFilter, DevicePatch, DeviceRecord, RecordStore, StoreError};

#[derive(Clone, Default)]
pub struct MemoryDeviceStore {
    records: Arc<RwLock<BTreeMap<String, DeviceRecord>>>,
}

impl MemoryDeviceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `records`. Later duplicates win.
    #[cfg(test)]
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = DeviceRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|r| (r.device_id.clone(), r))
            .collect();
        Self { records: Arc::new(RwLock::new(map)) }
    }

    /// Clone of every record, ordered by `device_id`.
    #[cfg(test)]
    pub async fn snapshot(&self) -> Vec<DeviceRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryDeviceStore {
    async fn update_where(&self, filter: &DeviceFilter, patch: &DevicePatch) -> Result<u64, StoreError> {
        if patch.is_empty() {
            return Ok(0);
        }

        let mut records = self.records.write().await;
        let mut updated = 0_u64;
        for record in records.values_mut().filter(|r| filter.matches(r)) {
            patch.apply(record);
            updated += 1;
        }
        Ok(updated)
    }

    async fn upsert(&self, record: &DeviceRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        records.insert(record.device_id.clone(), record.clone());
        Ok(())
    }

    async fn find(&self, filter: &DeviceFilter) -> Result<Vec<DeviceRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
