use super::*;
use crate::frame::ErrorCode;
use crate::store::MemoryDeviceStore;

fn record(device_id: &str, connection_id: &str, online: bool) -> DeviceRecord {
    DeviceRecord {
        device_id: device_id.into(),
        connection_id: Some(connection_id.into()),
        online,
        last_seen_ms: 100,
    }
}

fn updater_with(records: Vec<DeviceRecord>) -> (PresenceUpdater, MemoryDeviceStore) {
    let store = MemoryDeviceStore::with_records(records);
    (PresenceUpdater::new(Arc::new(store.clone())), store)
}

/// Store whose every call fails, for error propagation tests.
struct DownStore;

#[async_trait::async_trait]
impl RecordStore for DownStore {
    async fn update_where(&self, _filter: &DeviceFilter, _patch: &DevicePatch) -> Result<u64, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn upsert(&self, _record: &DeviceRecord) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn find(&self, _filter: &DeviceFilter) -> Result<Vec<DeviceRecord>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
}

// =============================================================================
// connection ids
// =============================================================================

#[test]
fn bytes_to_hex_pads_each_byte() {
    assert_eq!(bytes_to_hex(&[]), "");
    assert_eq!(bytes_to_hex(&[0x0a, 0xff]), "0aff");
}

#[test]
fn generate_connection_id_is_32_hex_chars() {
    let id = generate_connection_id();
    assert_eq!(id.len(), 32);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn generate_connection_id_two_calls_differ() {
    assert_ne!(generate_connection_id(), generate_connection_id());
}

// =============================================================================
// mark_offline
// =============================================================================

#[tokio::test]
async fn mark_offline_sets_matching_record_offline() {
    let (updater, store) = updater_with(vec![record("sock-1", "sock-1", true)]);

    updater.mark_offline("sock-1").await.unwrap();

    assert_eq!(store.snapshot().await, vec![record("sock-1", "sock-1", false)]);
}

#[tokio::test]
async fn mark_offline_leaves_other_records_unchanged() {
    let (updater, store) = updater_with(vec![
        record("laptop", "sock-1", true),
        record("phone", "sock-2", true),
        record("tablet", "sock-3", false),
    ]);

    updater.mark_offline("sock-1").await.unwrap();

    let records = store.snapshot().await;
    assert_eq!(records[0], record("laptop", "sock-1", false));
    assert_eq!(records[1], record("phone", "sock-2", true));
    assert_eq!(records[2], record("tablet", "sock-3", false));
}

#[tokio::test]
async fn mark_offline_unknown_connection_is_silent_noop() {
    let (updater, store) = updater_with(vec![record("phone", "sock-1", true)]);
    let before = store.snapshot().await;

    updater.mark_offline("sock-9").await.unwrap();

    assert_eq!(store.snapshot().await, before);
}

#[tokio::test]
async fn mark_offline_is_idempotent() {
    let (updater, store) = updater_with(vec![record("phone", "sock-1", true), record("laptop", "sock-2", true)]);

    updater.mark_offline("sock-1").await.unwrap();
    let after_first = store.snapshot().await;
    updater.mark_offline("sock-1").await.unwrap();

    assert_eq!(store.snapshot().await, after_first);
}

#[tokio::test]
async fn mark_offline_rejects_empty_connection_id() {
    let (updater, store) = updater_with(vec![record("phone", "sock-1", true)]);
    let err = updater.mark_offline("").await.unwrap_err();
    assert!(matches!(err, PresenceError::InvalidConnectionId));
    assert!(store.snapshot().await[0].online);
}

#[tokio::test]
async fn mark_offline_propagates_store_failure() {
    let updater = PresenceUpdater::new(Arc::new(DownStore));
    let err = updater.mark_offline("sock-1").await.unwrap_err();
    assert_eq!(err.error_code(), "E_DATABASE");
    assert!(err.retryable());
}

// =============================================================================
// mark_online / reconnect
// =============================================================================

#[tokio::test]
async fn mark_online_creates_record_with_fresh_connection() {
    let (updater, store) = updater_with(vec![]);

    let connection_id = updater.mark_online("phone").await.unwrap();

    let records = store.snapshot().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].device_id, "phone");
    assert_eq!(records[0].connection_id.as_deref(), Some(connection_id.as_str()));
    assert!(records[0].online);
    assert!(records[0].last_seen_ms > 0);
}

#[tokio::test]
async fn mark_online_rejects_empty_device_id() {
    let (updater, store) = updater_with(vec![]);
    let err = updater.mark_online("").await.unwrap_err();
    assert_eq!(err.error_code(), "E_INVALID_DEVICE_ID");
    assert!(store.snapshot().await.is_empty());
}

#[tokio::test]
async fn stale_disconnect_after_reconnect_keeps_device_online() {
    let (updater, store) = updater_with(vec![]);

    let first = updater.mark_online("phone").await.unwrap();
    let second = updater.mark_online("phone").await.unwrap();
    assert_ne!(first, second);

    updater.mark_offline(&first).await.unwrap();
    assert!(store.snapshot().await[0].online);

    updater.mark_offline(&second).await.unwrap();
    assert!(!store.snapshot().await[0].online);
}

// =============================================================================
// touch / reset_all / lookups
// =============================================================================

#[tokio::test]
async fn touch_refreshes_last_seen() {
    let (updater, store) = updater_with(vec![record("phone", "sock-1", true)]);

    assert!(updater.touch("sock-1").await.unwrap());
    assert!(store.snapshot().await[0].last_seen_ms > 100);

    assert!(!updater.touch("sock-9").await.unwrap());
}

#[tokio::test]
async fn reset_all_turns_every_device_offline() {
    let (updater, store) = updater_with(vec![
        record("a", "s1", true),
        record("b", "s2", true),
        record("c", "s3", false),
    ]);

    assert_eq!(updater.reset_all().await.unwrap(), 2);
    assert!(store.snapshot().await.iter().all(|r| !r.online));
    assert_eq!(updater.reset_all().await.unwrap(), 0);
}

#[tokio::test]
async fn list_filters_by_online_state() {
    let (updater, _store) = updater_with(vec![record("a", "s1", true), record("b", "s2", false)]);

    assert_eq!(updater.list(None).await.unwrap().len(), 2);
    let up = updater.list(Some(true)).await.unwrap();
    assert_eq!(up.len(), 1);
    assert_eq!(up[0].device_id, "a");
    let down = updater.list(Some(false)).await.unwrap();
    assert_eq!(down[0].device_id, "b");
}

#[tokio::test]
async fn get_returns_record_or_not_found() {
    let (updater, _store) = updater_with(vec![record("phone", "sock-1", true)]);

    let rec = updater.get("phone").await.unwrap();
    assert_eq!(rec.connection_id.as_deref(), Some("sock-1"));

    let err = updater.get("watch").await.unwrap_err();
    assert!(matches!(err, PresenceError::DeviceNotFound(ref id) if id == "watch"));
    assert_eq!(err.error_code(), "E_DEVICE_NOT_FOUND");
    assert!(!err.retryable());
}
