//! # Link History Repository
//!
//! Source-reference → published-link memoization, keyed uniquely on the
//! share code. The pipeline consults it before touching the provider; a
//! hit short-circuits every remote mutation.

use crate::error::Result;
use crate::models::LinkRecord;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

/// Repository trait for the idempotence cache
#[async_trait]
pub trait LinkHistoryRepository: Send + Sync {
    /// Record the links produced for a source, replacing any earlier entry
    async fn record(&self, share_code: &str, links: &[String]) -> Result<()>;

    /// Cached links for a source, if any
    async fn find_by_source(&self, share_code: &str) -> Result<Option<LinkRecord>>;

    /// Most recent records first
    async fn list_recent(&self, limit: u32) -> Result<Vec<LinkRecord>>;

    /// Bulk clear; returns how many rows were removed
    async fn clear(&self) -> Result<u64>;
}

/// SQLite implementation of [`LinkHistoryRepository`]
pub struct SqliteLinkHistoryRepository {
    pool: SqlitePool,
}

impl SqliteLinkHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<LinkRecord> {
        Ok(LinkRecord {
            id: row.get("id"),
            share_code: row.get("share_code"),
            links: serde_json::from_str(&row.get::<String, _>("links"))?,
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl LinkHistoryRepository for SqliteLinkHistoryRepository {
    async fn record(&self, share_code: &str, links: &[String]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO link_history (share_code, links, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(share_code) DO UPDATE SET links = excluded.links
            "#,
        )
        .bind(share_code)
        .bind(serde_json::to_string(links)?)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_source(&self, share_code: &str) -> Result<Option<LinkRecord>> {
        let row = sqlx::query(
            "SELECT id, share_code, links, created_at FROM link_history WHERE share_code = ?",
        )
        .bind(share_code)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<LinkRecord>> {
        let rows = sqlx::query(
            "SELECT id, share_code, links, created_at FROM link_history \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::record_from_row).collect()
    }

    async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM link_history")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn test_record_and_find() {
        let repo = SqliteLinkHistoryRepository::new(create_test_pool().await.unwrap());
        let links = vec!["https://example.com/s/new1".to_string()];

        repo.record("sw1", &links).await.unwrap();

        let found = repo.find_by_source("sw1").await.unwrap().unwrap();
        assert_eq!(found.links, links);
        assert!(repo.find_by_source("sw2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_replaces_on_conflict() {
        let repo = SqliteLinkHistoryRepository::new(create_test_pool().await.unwrap());

        repo.record("sw1", &["https://a".to_string()]).await.unwrap();
        repo.record(
            "sw1",
            &["https://b".to_string(), "https://c".to_string()],
        )
        .await
        .unwrap();

        let found = repo.find_by_source("sw1").await.unwrap().unwrap();
        assert_eq!(found.links.len(), 2);

        // still exactly one row
        assert_eq!(repo.list_recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let repo = SqliteLinkHistoryRepository::new(create_test_pool().await.unwrap());
        repo.record("sw1", &["https://a".to_string()]).await.unwrap();
        repo.record("sw2", &["https://b".to_string()]).await.unwrap();

        assert_eq!(repo.clear().await.unwrap(), 2);
        assert!(repo.list_recent(10).await.unwrap().is_empty());
    }
}
