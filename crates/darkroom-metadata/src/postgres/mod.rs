//! PostgreSQL metadata repository implementation

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tokio::sync::broadcast;
use tracing::{debug, info};

use darkroom_core::types::{AttributeName, ChangeKind, MetadataRecord, RecordChange};
use darkroom_core::{Error, Result};

use crate::traits::{MetadataRepository, CHANGE_STREAM_CAPACITY};

/// PostgreSQL metadata store
pub struct PostgresRepository {
    pool: PgPool,
    changes: broadcast::Sender<RecordChange>,
}

impl PostgresRepository {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;

        let (changes, _) = broadcast::channel(CHANGE_STREAM_CAPACITY);
        let store = Self { pool, changes };
        store.init().await?;

        info!("PostgreSQL metadata store ready");
        Ok(store)
    }

    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                file_name TEXT PRIMARY KEY,
                bucket TEXT NOT NULL,
                attributes JSONB NOT NULL DEFAULT '{}'::jsonb,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        Ok(())
    }

    fn publish(&self, kind: ChangeKind, record: MetadataRecord) {
        let _ = self.changes.send(RecordChange { kind, record });
    }

    fn record_from_row(file_name: &str, row: &sqlx::postgres::PgRow) -> Result<MetadataRecord> {
        let bucket: String = row.try_get("bucket").map_err(|e| Error::Store(e.to_string()))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| Error::Store(e.to_string()))?;
        let attributes: serde_json::Value = row
            .try_get("attributes")
            .map_err(|e| Error::Store(e.to_string()))?;
        let attributes: HashMap<AttributeName, String> = serde_json::from_value(attributes)?;

        Ok(MetadataRecord {
            file_name: file_name.to_string(),
            bucket,
            attributes,
            created_at,
        })
    }
}

#[async_trait]
impl MetadataRepository for PostgresRepository {
    async fn put(&self, file_name: &str, bucket: &str) -> Result<()> {
        // The existence probe only decides the change-stream kind; the
        // upsert itself is a single atomic statement.
        let existed: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM records WHERE file_name = $1)")
                .bind(file_name)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| Error::Store(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO records (file_name, bucket, attributes, created_at)
            VALUES ($1, $2, '{}'::jsonb, NOW())
            ON CONFLICT (file_name)
            DO UPDATE SET bucket = EXCLUDED.bucket, attributes = '{}'::jsonb, created_at = NOW()
            "#,
        )
        .bind(file_name)
        .bind(bucket)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        let kind = if existed {
            ChangeKind::Modified
        } else {
            ChangeKind::Inserted
        };
        debug!("put record {} ({})", file_name, kind.as_str());
        self.publish(kind, MetadataRecord::new(file_name, bucket));
        Ok(())
    }

    async fn update(&self, file_name: &str, attribute: AttributeName, value: &str) -> Result<()> {
        // Conditional write: only an existing record is updated.
        let result = sqlx::query(
            r#"
            UPDATE records
            SET attributes = attributes || jsonb_build_object($2::text, $3::text)
            WHERE file_name = $1
            "#,
        )
        .bind(file_name)
        .bind(attribute.as_str())
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound(file_name.to_string()));
        }

        debug!("set {}={} on {}", attribute, value, file_name);
        if let Some(record) = self.get(file_name).await? {
            self.publish(ChangeKind::Modified, record);
        }
        Ok(())
    }

    async fn delete(&self, file_name: &str) -> Result<()> {
        let row = sqlx::query(
            "DELETE FROM records WHERE file_name = $1 RETURNING bucket, attributes, created_at",
        )
        .bind(file_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        if let Some(row) = row {
            debug!("deleted record {}", file_name);
            let record = Self::record_from_row(file_name, &row)?;
            self.publish(ChangeKind::Removed, record);
        }
        Ok(())
    }

    async fn get(&self, file_name: &str) -> Result<Option<MetadataRecord>> {
        let row = sqlx::query(
            "SELECT bucket, attributes, created_at FROM records WHERE file_name = $1",
        )
        .bind(file_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(Self::record_from_row(file_name, &row)?)),
            None => Ok(None),
        }
    }

    fn changes(&self) -> broadcast::Receiver<RecordChange> {
        self.changes.subscribe()
    }
}
