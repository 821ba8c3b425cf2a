//! # Pending Transfer Repository
//!
//! Shares parked while the provider audits, snapshots or throttles. Rows
//! are owned by the long poller: it bumps the attempt bookkeeping on every
//! probe and deletes the row once the transfer resolves either way.

use crate::error::Result;
use crate::models::{PendingStatus, PendingTransfer};
use async_trait::async_trait;
use provider_traits::ShareRef;
use sqlx::{Row, SqlitePool};

/// Repository trait for pending transfer persistence
#[async_trait]
pub trait PendingTransferRepository: Send + Sync {
    /// Park a share; returns the new row ID
    async fn insert(
        &self,
        source: &ShareRef,
        metadata: &serde_json::Value,
        status: PendingStatus,
    ) -> Result<i64>;

    /// All parked shares, oldest first
    async fn list(&self) -> Result<Vec<PendingTransfer>>;

    /// Bump the attempt counter and last-check timestamp
    async fn record_attempt(&self, id: i64, now: i64) -> Result<()>;

    /// Update the parked status
    async fn set_status(&self, id: i64, status: PendingStatus) -> Result<()>;

    /// Remove a resolved row
    async fn delete(&self, id: i64) -> Result<()>;

    /// Number of parked shares
    async fn count(&self) -> Result<u64>;
}

/// SQLite implementation of [`PendingTransferRepository`]
pub struct SqlitePendingTransferRepository {
    pool: SqlitePool,
}

impl SqlitePendingTransferRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PendingTransferRepository for SqlitePendingTransferRepository {
    async fn insert(
        &self,
        source: &ShareRef,
        metadata: &serde_json::Value,
        status: PendingStatus,
    ) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO pending_transfers (share_code, access_code, metadata, status,
                                           attempts, last_check, created_at)
            VALUES (?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&source.share_code)
        .bind(&source.access_code)
        .bind(serde_json::to_string(metadata)?)
        .bind(status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn list(&self) -> Result<Vec<PendingTransfer>> {
        let rows = sqlx::query(
            "SELECT id, share_code, access_code, metadata, status, attempts, last_check, \
             created_at FROM pending_transfers ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut transfers = Vec::with_capacity(rows.len());
        for row in rows {
            let mut source = ShareRef::new(row.get::<String, _>("share_code"));
            if let Some(code) = row.get::<Option<String>, _>("access_code") {
                source = source.with_access_code(code);
            }

            transfers.push(PendingTransfer {
                id: row.get("id"),
                source,
                metadata: serde_json::from_str(&row.get::<String, _>("metadata"))?,
                status: row.get::<String, _>("status").parse()?,
                attempts: row.get::<i64, _>("attempts") as u32,
                last_check: row.get("last_check"),
                created_at: row.get("created_at"),
            });
        }

        Ok(transfers)
    }

    async fn record_attempt(&self, id: i64, now: i64) -> Result<()> {
        sqlx::query(
            "UPDATE pending_transfers SET attempts = attempts + 1, last_check = ? WHERE id = ?",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_status(&self, id: i64, status: PendingStatus) -> Result<()> {
        sqlx::query("UPDATE pending_transfers SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM pending_transfers WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_transfers")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_list_delete() {
        let repo = SqlitePendingTransferRepository::new(create_test_pool().await.unwrap());

        let source = ShareRef::new("sw1").with_access_code("pw");
        let metadata = json!({"caption": "weekly drop"});
        let id = repo
            .insert(&source, &metadata, PendingStatus::Auditing)
            .await
            .unwrap();

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].source, source);
        assert_eq!(all[0].metadata, metadata);
        assert_eq!(all[0].status, PendingStatus::Auditing);
        assert_eq!(all[0].attempts, 0);

        repo.delete(id).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_record_attempt_bumps_bookkeeping() {
        let repo = SqlitePendingTransferRepository::new(create_test_pool().await.unwrap());
        let id = repo
            .insert(
                &ShareRef::new("sw1"),
                &json!({}),
                PendingStatus::Snapshotting,
            )
            .await
            .unwrap();

        repo.record_attempt(id, 1_700_000_123).await.unwrap();
        repo.record_attempt(id, 1_700_000_456).await.unwrap();

        let row = &repo.list().await.unwrap()[0];
        assert_eq!(row.attempts, 2);
        assert_eq!(row.last_check, 1_700_000_456);
    }

    #[tokio::test]
    async fn test_set_status() {
        let repo = SqlitePendingTransferRepository::new(create_test_pool().await.unwrap());
        let id = repo
            .insert(&ShareRef::new("sw1"), &json!({}), PendingStatus::Restricted)
            .await
            .unwrap();

        repo.set_status(id, PendingStatus::Auditing).await.unwrap();
        assert_eq!(repo.list().await.unwrap()[0].status, PendingStatus::Auditing);
    }
}
