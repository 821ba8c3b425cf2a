//! # Transfer Item Repository
//!
//! Persistence for the rows of a job. Status transitions are driven
//! exclusively by the controller and the pipeline it invokes.

use crate::error::Result;
use crate::models::{ItemCounts, ItemStatus, JobId, NewItem, TransferItem};
use async_trait::async_trait;
use provider_traits::ShareRef;
use sqlx::{Row, SqlitePool};

/// Repository trait for transfer item persistence
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Bulk-insert the rows of a freshly created job, assigning 1-based
    /// positions in input order
    async fn insert_batch(&self, job_id: JobId, items: &[NewItem]) -> Result<()>;

    /// Find an item by ID
    async fn find_by_id(&self, id: i64) -> Result<Option<TransferItem>>;

    /// Next `pending` item of the job in position order
    async fn next_pending(&self, job_id: JobId) -> Result<Option<TransferItem>>;

    /// Set an item's status
    async fn set_status(&self, id: i64, status: ItemStatus) -> Result<()>;

    /// Settle an item with its produced links and/or error text
    async fn record_outcome(
        &self,
        id: i64,
        status: ItemStatus,
        links: &[String],
        error: Option<&str>,
    ) -> Result<()>;

    /// Fresh-start skip semantics: positions ≤ `skip` become `skipped`,
    /// everything after becomes `pending`
    async fn apply_skip(&self, job_id: JobId, skip: u32) -> Result<()>;

    /// Reset every `processing` item (any job) back to `pending`; returns
    /// how many were reset
    async fn reset_processing(&self) -> Result<u64>;

    /// Item-status histogram for a job
    async fn counts(&self, job_id: JobId) -> Result<ItemCounts>;

    /// All items of a job in position order
    async fn list_for_job(&self, job_id: JobId) -> Result<Vec<TransferItem>>;
}

/// SQLite implementation of [`ItemRepository`]
pub struct SqliteItemRepository {
    pool: SqlitePool,
}

impl SqliteItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn item_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<TransferItem> {
        let access_code: Option<String> = row.get("access_code");
        let mut source = ShareRef::new(row.get::<String, _>("share_code"));
        if let Some(code) = access_code {
            source = source.with_access_code(code);
        }

        let links: Vec<String> = serde_json::from_str(&row.get::<String, _>("links"))?;

        Ok(TransferItem {
            id: row.get("id"),
            job_id: JobId::from_string(&row.get::<String, _>("job_id"))?,
            position: row.get::<i64, _>("position") as u32,
            source,
            title: row.get("title"),
            status: row.get::<String, _>("status").parse()?,
            links,
            error_message: row.get("error_message"),
        })
    }
}

const ITEM_COLUMNS: &str =
    "id, job_id, position, share_code, access_code, title, status, links, error_message";

#[async_trait]
impl ItemRepository for SqliteItemRepository {
    async fn insert_batch(&self, job_id: JobId, items: &[NewItem]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (index, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO transfer_items (job_id, position, share_code, access_code, title)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(job_id.as_str())
            .bind((index + 1) as i64)
            .bind(&item.source.share_code)
            .bind(&item.source.access_code)
            .bind(&item.title)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<TransferItem>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM transfer_items WHERE id = ?",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::item_from_row).transpose()
    }

    async fn next_pending(&self, job_id: JobId) -> Result<Option<TransferItem>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM transfer_items \
             WHERE job_id = ? AND status = 'pending' \
             ORDER BY position ASC LIMIT 1",
            ITEM_COLUMNS
        ))
        .bind(job_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::item_from_row).transpose()
    }

    async fn set_status(&self, id: i64, status: ItemStatus) -> Result<()> {
        sqlx::query("UPDATE transfer_items SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn record_outcome(
        &self,
        id: i64,
        status: ItemStatus,
        links: &[String],
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE transfer_items SET status = ?, links = ?, error_message = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(serde_json::to_string(links)?)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn apply_skip(&self, job_id: JobId, skip: u32) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE transfer_items SET status = 'skipped' WHERE job_id = ? AND position <= ?",
        )
        .bind(job_id.as_str())
        .bind(skip as i64)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE transfer_items SET status = 'pending' WHERE job_id = ? AND position > ?",
        )
        .bind(job_id.as_str())
        .bind(skip as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn reset_processing(&self) -> Result<u64> {
        let result =
            sqlx::query("UPDATE transfer_items SET status = 'pending' WHERE status = 'processing'")
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    async fn counts(&self, job_id: JobId) -> Result<ItemCounts> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS n FROM transfer_items WHERE job_id = ? GROUP BY status",
        )
        .bind(job_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut counts = ItemCounts::default();
        for row in rows {
            let n = row.get::<i64, _>("n") as u32;
            match row.get::<String, _>("status").parse::<ItemStatus>()? {
                ItemStatus::Pending => counts.pending = n,
                ItemStatus::Processing => counts.processing = n,
                ItemStatus::Success => counts.success = n,
                ItemStatus::Failed => counts.failed = n,
                ItemStatus::Skipped => counts.skipped = n,
            }
        }

        Ok(counts)
    }

    async fn list_for_job(&self, job_id: JobId) -> Result<Vec<TransferItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM transfer_items WHERE job_id = ? ORDER BY position ASC",
            ITEM_COLUMNS
        ))
        .bind(job_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::item_from_row).collect()
    }
}
