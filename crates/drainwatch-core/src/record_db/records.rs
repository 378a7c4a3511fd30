//! Record operations: save, load, list, delete.

use anyhow::{Context, Result};
use sqlx::Row;

use super::db::RecordDb;
use super::types::PersistedJobRecord;
use crate::clock::{Clock, SystemClock, UnixMillis};
use crate::job::ResourceId;

impl RecordDb {
    /// Insert or replace the record for the request's resource.
    pub async fn save(&self, record: &PersistedJobRecord) -> Result<()> {
        let json = serde_json::to_string(record).context("serialize job record")?;
        sqlx::query(
            r#"
            INSERT INTO job_records (resource_id, created_at, updated_at, record_json)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(resource_id) DO UPDATE SET
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                record_json = excluded.record_json
            "#,
        )
        .bind(record.request.resource_id.as_str())
        .bind(record.created_at())
        .bind(SystemClock.now())
        .bind(json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Overwrite the record only if it still belongs to the same job
    /// (same `created_at`). Returns false when a newer job owns the key.
    pub async fn update_if_current(&self, record: &PersistedJobRecord) -> Result<bool> {
        let json = serde_json::to_string(record).context("serialize job record")?;
        let result = sqlx::query(
            r#"
            UPDATE job_records
            SET record_json = ?1,
                updated_at = ?2
            WHERE resource_id = ?3 AND created_at = ?4
            "#,
        )
        .bind(json)
        .bind(SystemClock.now())
        .bind(record.request.resource_id.as_str())
        .bind(record.created_at())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn load(&self, resource_id: &ResourceId) -> Result<Option<PersistedJobRecord>> {
        let row = sqlx::query(
            r#"
            SELECT record_json FROM job_records
            WHERE resource_id = ?1
            "#,
        )
        .bind(resource_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let json: String = row.get("record_json");
        let record = serde_json::from_str(&json)
            .with_context(|| format!("parse job record for {resource_id}"))?;
        Ok(Some(record))
    }

    /// All records, oldest first. Rows that no longer parse are skipped.
    pub async fn list(&self) -> Result<Vec<PersistedJobRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT resource_id, record_json FROM job_records
            ORDER BY created_at ASC, resource_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.get("resource_id");
            let json: String = row.get("record_json");
            match serde_json::from_str::<PersistedJobRecord>(&json) {
                Ok(record) => out.push(record),
                Err(e) => tracing::warn!(resource_id = %key, "skipping unreadable job record: {}", e),
            }
        }
        Ok(out)
    }

    /// Remove the record for a resource, whichever job owns it.
    pub async fn delete(&self, resource_id: &ResourceId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM job_records
            WHERE resource_id = ?1
            "#,
        )
        .bind(resource_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove the record only if it belongs to the job created at `created_at`.
    pub async fn delete_if_current(
        &self,
        resource_id: &ResourceId,
        created_at: UnixMillis,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM job_records
            WHERE resource_id = ?1 AND created_at = ?2
            "#,
        )
        .bind(resource_id.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
