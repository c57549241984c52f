//! Postgres-backed hash store
//!
//! One `chunk_records` row per `(sync_id, entity_id)` ever seen for a sync.
//! Rows are created on first sight, updated when the hash changes, and
//! removed by the end-of-run sweep.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use tributary_common::{Result, SyncError};

use super::change::HashStore;

pub struct PostgresHashStore {
    pool: PgPool,
}

impl PostgresHashStore {
    /// Connect and ensure the `chunk_records` table exists.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await
            .map_err(store_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunk_records (
                sync_id      UUID        NOT NULL,
                entity_id    TEXT        NOT NULL,
                content_hash TEXT        NOT NULL,
                updated_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (sync_id, entity_id)
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(store_error)?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HashStore for PostgresHashStore {
    async fn get(&self, sync_id: Uuid, entity_id: &str) -> Result<Option<String>> {
        sqlx::query_scalar(
            "SELECT content_hash FROM chunk_records WHERE sync_id = $1 AND entity_id = $2",
        )
        .bind(sync_id)
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)
    }

    async fn put(&self, sync_id: Uuid, entity_id: &str, hash: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chunk_records (sync_id, entity_id, content_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (sync_id, entity_id)
            DO UPDATE SET content_hash = excluded.content_hash, updated_at = now()
            "#,
        )
        .bind(sync_id)
        .bind(entity_id)
        .bind(hash)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn delete_untouched(
        &self,
        sync_id: Uuid,
        touched: &HashSet<String>,
    ) -> Result<Vec<String>> {
        let touched: Vec<String> = touched.iter().cloned().collect();
        let rows = sqlx::query(
            r#"
            DELETE FROM chunk_records
            WHERE sync_id = $1 AND NOT (entity_id = ANY($2))
            RETURNING entity_id
            "#,
        )
        .bind(sync_id)
        .bind(&touched)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows
            .iter()
            .map(|row| row.get::<String, _>("entity_id"))
            .collect())
    }
}

fn store_error(err: sqlx::Error) -> SyncError {
    SyncError::HashStore(err.to_string())
}
