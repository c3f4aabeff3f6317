use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::time::format_utc;
use crate::types::{Heartbeat, HeartbeatStatus};

#[derive(Debug, thiserror::Error)]
pub enum HeartbeatStoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("invalid stored heartbeat: {0}")]
    Parse(String),
}

/// Persistence seam for the heartbeat monitor; one record per source.
#[async_trait]
pub trait HeartbeatStore: Send + Sync {
    async fn get_last_heartbeat(&self, source: &str)
        -> Result<Option<Heartbeat>, HeartbeatStoreError>;
    async fn save_heartbeat(&self, heartbeat: &Heartbeat) -> Result<(), HeartbeatStoreError>;

    /// Refresh liveness after an inbound webhook: timestamp now, count + 1,
    /// status healthy. The read and write are one atomic step.
    async fn record_inbound(&self, source: &str) -> Result<Heartbeat, HeartbeatStoreError>;
}

/// Process-local store. History is lost on restart; use
/// [`SqliteHeartbeatStore`] outside of tests.
#[derive(Default)]
pub struct InMemoryHeartbeatStore {
    records: Mutex<HashMap<String, Heartbeat>>,
}

impl InMemoryHeartbeatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HeartbeatStore for InMemoryHeartbeatStore {
    async fn get_last_heartbeat(
        &self,
        source: &str,
    ) -> Result<Option<Heartbeat>, HeartbeatStoreError> {
        Ok(self.records.lock().await.get(source).cloned())
    }

    async fn save_heartbeat(&self, heartbeat: &Heartbeat) -> Result<(), HeartbeatStoreError> {
        self.records
            .lock()
            .await
            .insert(heartbeat.source.clone(), heartbeat.clone());
        Ok(())
    }

    async fn record_inbound(&self, source: &str) -> Result<Heartbeat, HeartbeatStoreError> {
        let mut records = self.records.lock().await;
        let count = records.get(source).map_or(0, |hb| hb.count) + 1;
        let heartbeat = Heartbeat {
            source: source.to_string(),
            timestamp: format_utc(Utc::now()),
            count,
            status: HeartbeatStatus::Healthy,
        };
        records.insert(source.to_string(), heartbeat.clone());
        Ok(heartbeat)
    }
}

#[derive(Clone)]
pub struct SqliteHeartbeatStore {
    pool: SqlitePool,
}

impl SqliteHeartbeatStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HeartbeatStore for SqliteHeartbeatStore {
    async fn get_last_heartbeat(
        &self,
        source: &str,
    ) -> Result<Option<Heartbeat>, HeartbeatStoreError> {
        let row = sqlx::query_as::<_, HeartbeatRow>(
            r#"
            SELECT source, timestamp, count, status
            FROM heartbeats
            WHERE source = ?
            "#,
        )
        .bind(source)
        .fetch_optional(&self.pool)
        .await?;

        row.map(HeartbeatRow::try_into).transpose()
    }

    async fn save_heartbeat(&self, heartbeat: &Heartbeat) -> Result<(), HeartbeatStoreError> {
        sqlx::query(
            r#"
            INSERT INTO heartbeats (source, timestamp, count, status)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(source) DO UPDATE SET
                timestamp = excluded.timestamp,
                count = excluded.count,
                status = excluded.status
            "#,
        )
        .bind(&heartbeat.source)
        .bind(&heartbeat.timestamp)
        .bind(heartbeat.count)
        .bind(heartbeat.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_inbound(&self, source: &str) -> Result<Heartbeat, HeartbeatStoreError> {
        let row = sqlx::query_as::<_, HeartbeatRow>(
            r#"
            INSERT INTO heartbeats (source, timestamp, count, status)
            VALUES (?, ?, 1, ?)
            ON CONFLICT(source) DO UPDATE SET
                timestamp = excluded.timestamp,
                count = heartbeats.count + 1,
                status = excluded.status
            RETURNING source, timestamp, count, status
            "#,
        )
        .bind(source)
        .bind(format_utc(Utc::now()))
        .bind(HeartbeatStatus::Healthy.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }
}

#[derive(sqlx::FromRow)]
struct HeartbeatRow {
    source: String,
    timestamp: String,
    count: i64,
    status: String,
}

impl TryFrom<HeartbeatRow> for Heartbeat {
    type Error = HeartbeatStoreError;

    fn try_from(row: HeartbeatRow) -> Result<Self, Self::Error> {
        let status = HeartbeatStatus::parse(&row.status).ok_or_else(|| {
            HeartbeatStoreError::Parse(format!("unknown heartbeat status: {}", row.status))
        })?;

        Ok(Heartbeat {
            source: row.source,
            timestamp: row.timestamp,
            count: row.count,
            status,
        })
    }
}
