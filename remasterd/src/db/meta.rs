//! Per-track mastering bookkeeping
//!
//! Key-value rows scoped by track, the remasterd implementation of the
//! client's [`JobStore`] adapter. Values are strings; the pipeline stores
//! reports as JSON text under the canonical keys.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use remaster_client::state::JobState;
use remaster_client::store::{keys, JobStore};

#[derive(Clone)]
pub struct MetaStore {
    db: SqlitePool,
}

impl MetaStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Tracks whose jobs the background poller should refresh.
    pub async fn entities_wanting_poll(&self) -> Result<Vec<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT track_guid FROM track_meta WHERE key = ? AND value IN (?, ?) ORDER BY track_guid",
        )
        .bind(keys::STATE)
        .bind(JobState::SubmittedProcessing.as_str())
        .bind(JobState::ErrorFetchingStatus.as_str())
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(guid,)| Uuid::parse_str(&guid).ok())
            .collect())
    }

    /// Remove every meta row for one track (track deletion cleanup).
    pub async fn clear_entity(&self, entity: &str) -> Result<()> {
        sqlx::query("DELETE FROM track_meta WHERE track_guid = ?")
            .bind(entity)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for MetaStore {
    async fn get(&self, entity: &str, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM track_meta WHERE track_guid = ? AND key = ?")
                .bind(entity)
                .bind(key)
                .fetch_optional(&self.db)
                .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, entity: &str, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO track_meta (track_guid, key, value, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(track_guid, key) DO UPDATE
             SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(entity)
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete(&self, entity: &str, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM track_meta WHERE track_guid = ? AND key = ?")
            .bind(entity)
            .bind(key)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
