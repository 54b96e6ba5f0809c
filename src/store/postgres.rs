//! Postgres device store backed by the `devices` table.
//!
//! Each operation is a single statement, so concurrent disconnects never
//! need coordination beyond what Postgres gives a lone `UPDATE`.

use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{DeviceFilter, DevicePatch, DeviceRecord, RecordStore, StoreError};

type DeviceRow = (String, Option<String>, bool, i64);

#[derive(Clone)]
pub struct PgDeviceStore {
    pool: PgPool,
}

impl PgDeviceStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Append a `WHERE` clause for `filter`. `All` appends nothing.
fn push_filter<'a>(builder: &mut QueryBuilder<'a, Postgres>, filter: &'a DeviceFilter) {
    match filter {
        DeviceFilter::ConnectionId(id) => {
            builder.push(" WHERE connection_id = ");
            builder.push_bind(id.as_str());
        }
        DeviceFilter::DeviceId(id) => {
            builder.push(" WHERE device_id = ");
            builder.push_bind(id.as_str());
        }
        DeviceFilter::Online => {
            builder.push(" WHERE online");
        }
        DeviceFilter::Offline => {
            builder.push(" WHERE NOT online");
        }
        DeviceFilter::All => {}
    }
}

/// Build the `UPDATE` for a non-empty patch. Returns `None` for an empty one.
fn build_update<'a>(filter: &'a DeviceFilter, patch: &DevicePatch) -> Option<QueryBuilder<'a, Postgres>> {
    if patch.is_empty() {
        return None;
    }

    let mut builder = QueryBuilder::new("UPDATE devices SET ");
    {
        let mut sets = builder.separated(", ");
        if let Some(online) = patch.online {
            sets.push("online = ");
            sets.push_bind_unseparated(online);
        }
        if let Some(ts) = patch.last_seen_ms {
            sets.push("last_seen_ms = ");
            sets.push_bind_unseparated(ts);
        }
    }
    push_filter(&mut builder, filter);
    Some(builder)
}

fn build_find(filter: &DeviceFilter) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new("SELECT device_id, connection_id, online, last_seen_ms FROM devices");
    push_filter(&mut builder, filter);
    builder.push(" ORDER BY device_id ASC");
    builder
}

#[async_trait::async_trait]
impl RecordStore for PgDeviceStore {
    async fn update_where(&self, filter: &DeviceFilter, patch: &DevicePatch) -> Result<u64, StoreError> {
        let Some(mut builder) = build_update(filter, patch) else {
            return Ok(0);
        };
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn upsert(&self, record: &DeviceRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO devices (device_id, connection_id, online, last_seen_ms)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (device_id) DO UPDATE
             SET connection_id = EXCLUDED.connection_id,
                 online = EXCLUDED.online,
                 last_seen_ms = EXCLUDED.last_seen_ms",
        )
        .bind(&record.device_id)
        .bind(&record.connection_id)
        .bind(record.online)
        .bind(record.last_seen_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, filter: &DeviceFilter) -> Result<Vec<DeviceRecord>, StoreError> {
        let rows = build_find(filter)
            .build_query_as::<DeviceRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(device_id, connection_id, online, last_seen_ms)| DeviceRecord {
                device_id,
                connection_id,
                online,
                last_seen_ms,
            })
            .collect())
    }
}

#[cfg(test)]
#[path = "postgres_test.rs"]
mod tests;
