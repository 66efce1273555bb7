//! `files` table: downloaded identities and search results.

use anyhow::Result;
use sqlx::Row;
use std::collections::HashSet;
use std::path::Path;

use super::db::SqliteStore;
use super::types::{FileOrigin, OriginBreakdown};
use crate::naming::unix_timestamp;

impl SqliteStore {
    pub(crate) async fn load_downloaded(&self) -> Result<HashSet<String>> {
        let rows = sqlx::query(
            r#"SELECT file_id FROM files WHERE origin = 'remote' AND status = 'downloaded'"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|row| row.get::<String, _>("file_id")).collect())
    }

    /// Insert or refresh a file row; absent path/size keep what is stored.
    pub(crate) async fn upsert_file(
        &self,
        file_id: &str,
        path: Option<&Path>,
        size_bytes: Option<u64>,
        origin: FileOrigin,
    ) -> Result<()> {
        let now = unix_timestamp();
        let path = path.map(|p| p.to_string_lossy().into_owned());
        let size = size_bytes.map(|s| s as i64);
        sqlx::query(
            r#"
            INSERT INTO files (file_id, path, size_bytes, origin, status, created_at, downloaded_at)
            VALUES (?1, ?2, ?3, ?4, 'downloaded', ?5, ?5)
            ON CONFLICT(file_id) DO UPDATE SET
                path = COALESCE(excluded.path, files.path),
                size_bytes = COALESCE(excluded.size_bytes, files.size_bytes),
                status = 'downloaded',
                downloaded_at = excluded.downloaded_at
            "#,
        )
        .bind(file_id)
        .bind(path)
        .bind(size)
        .bind(origin.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stored path and size for one identity.
    pub async fn file_entry(&self, file_id: &str) -> Result<Option<(Option<String>, Option<i64>)>> {
        let row = sqlx::query(r#"SELECT path, size_bytes FROM files WHERE file_id = ?1"#)
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| (row.get("path"), row.get("size_bytes"))))
    }

    pub async fn origin_breakdown(&self) -> Result<OriginBreakdown> {
        let rows = sqlx::query(r#"SELECT origin, COUNT(*) AS n FROM files GROUP BY origin"#)
            .fetch_all(&self.pool)
            .await?;
        let mut out = OriginBreakdown::default();
        for row in rows {
            let origin: String = row.get("origin");
            let n: i64 = row.get("n");
            match FileOrigin::from_str(&origin) {
                Some(FileOrigin::Remote) => out.remote += n.max(0) as u64,
                Some(FileOrigin::Search) => out.search += n.max(0) as u64,
                None => tracing::warn!(origin = %origin, "unknown file origin in store"),
            }
        }
        Ok(out)
    }
}
