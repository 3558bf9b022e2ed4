use crate::error::CoreError;
use crate::models::{OverrideFields, OverrideRecord};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct OverrideRow {
    key: String,
    task_id: String,
    date: String,
    overrides: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OverrideRow> for OverrideRecord {
    type Error = CoreError;

    fn try_from(row: OverrideRow) -> Result<Self, Self::Error> {
        let task_id = Uuid::parse_str(&row.task_id)
            .map_err(|_| CoreError::InvalidInput(format!("Malformed task id in override '{}'", row.key)))?;
        let overrides: OverrideFields = serde_json::from_str(&row.overrides)?;
        Ok(OverrideRecord {
            task_id,
            date: row.date,
            overrides,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl super::OverrideBackend for SqliteRepository {
    async fn load_all(&self) -> Result<Vec<OverrideRecord>, CoreError> {
        let rows: Vec<OverrideRow> = sqlx::query_as(
            "SELECT key, task_id, date, overrides, created_at, updated_at FROM instance_overrides ORDER BY task_id, date",
        )
        .fetch_all(self.pool())
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let key = row.key.clone();
            match OverrideRecord::try_from(row) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(key = %key, error = %e, "skipping undecodable override row"),
            }
        }
        Ok(records)
    }

    async fn upsert(&self, record: &OverrideRecord) -> Result<(), CoreError> {
        sqlx::query(
            r#"INSERT INTO instance_overrides (key, task_id, date, overrides, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (key) DO UPDATE SET
                overrides = excluded.overrides,
                updated_at = excluded.updated_at"#,
        )
        .bind(record.key())
        .bind(record.task_id.to_string())
        .bind(&record.date)
        .bind(serde_json::to_string(&record.overrides)?)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CoreError> {
        let result = sqlx::query("DELETE FROM instance_overrides WHERE key = $1")
            .bind(key)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
