//! `job_records` table: one row per download or search run.

use anyhow::Result;
use sqlx::Row;

use super::db::SqliteStore;
use super::types::{JobRecord, RecordStatus};
use crate::naming::unix_timestamp;

impl SqliteStore {
    pub(crate) async fn insert_record(&self, job_type: &str, details: &serde_json::Value) -> Result<i64> {
        let now = unix_timestamp();
        let details_json = serde_json::to_string(details)?;
        let row = sqlx::query(
            r#"
            INSERT INTO job_records (job_type, status, started_at, details_json)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id
            "#,
        )
        .bind(job_type)
        .bind(RecordStatus::Running.as_str())
        .bind(now)
        .bind(details_json)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("id"))
    }

    pub(crate) async fn close_record(
        &self,
        record_id: i64,
        status: RecordStatus,
        details: &serde_json::Value,
    ) -> Result<()> {
        let now = unix_timestamp();
        let details_json = serde_json::to_string(details)?;
        sqlx::query(
            r#"
            UPDATE job_records
            SET status = ?1, finished_at = ?2, details_json = ?3
            WHERE id = ?4
            "#,
        )
        .bind(status.as_str())
        .bind(now)
        .bind(details_json)
        .bind(record_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent records first.
    pub async fn list_job_records(&self, limit: u32) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, job_type, status, started_at, finished_at, details_json
            FROM job_records
            ORDER BY started_at DESC, id DESC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit.max(1)))
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.get("status");
            let details_json: Option<String> = row.get("details_json");
            let details = details_json
                .as_deref()
                .filter(|s| !s.is_empty())
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or(serde_json::Value::Null);
            out.push(JobRecord {
                id: row.get("id"),
                job_type: row.get("job_type"),
                status: RecordStatus::from_str(&status),
                started_at: row.get("started_at"),
                finished_at: row.get("finished_at"),
                details,
            });
        }
        Ok(out)
    }
}
