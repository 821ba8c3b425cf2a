//! # Transfer Job Repository
//!
//! Persistence for [`TransferJob`] rows. Jobs are mutated only through the
//! controller; every status write goes through `update_status` so the
//! transition stays observable in one place.

use crate::error::{Result, StoreError};
use crate::models::{JobId, JobStatus, TransferJob};
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

/// Repository trait for transfer job persistence
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job
    async fn insert(&self, job: &TransferJob) -> Result<()>;

    /// Find a job by ID
    async fn find_by_id(&self, id: JobId) -> Result<Option<TransferJob>>;

    /// All jobs, most recent first
    async fn list(&self) -> Result<Vec<TransferJob>>;

    /// Set the job status
    async fn update_status(&self, id: JobId, status: JobStatus) -> Result<()>;

    /// Persist the start parameters (skip count and jitter bounds)
    async fn update_start_params(&self, id: JobId, skip: u32, min: u32, max: u32) -> Result<()>;

    /// Set the waiting-between-items flag
    async fn set_waiting(&self, id: JobId, waiting: bool) -> Result<()>;

    /// Advance the position pointer
    async fn set_position(&self, id: JobId, position: u32) -> Result<()>;

    /// Overwrite the success/fail counters
    async fn update_counters(&self, id: JobId, success: u32, fail: u32) -> Result<()>;

    /// The job currently holding (or settling out of) the running slot
    async fn find_active(&self) -> Result<Option<TransferJob>>;

    /// Oldest queued job, FIFO by creation time
    async fn oldest_queued(&self) -> Result<Option<TransferJob>>;

    /// Force every interrupted job (`running`/`pausing`/`cancelling`/
    /// `queued`) to `paused`; returns how many were reset
    async fn reset_interrupted(&self) -> Result<u64>;

    /// Delete a job (items cascade)
    async fn delete(&self, id: JobId) -> Result<()>;
}

/// SQLite implementation of [`JobRepository`]
pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a transfer job
#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    name: String,
    status: String,
    total_count: i64,
    success_count: i64,
    fail_count: i64,
    min_delay_secs: i64,
    max_delay_secs: i64,
    skip_count: i64,
    position: i64,
    waiting: i64,
    created_at: i64,
}

impl TryFrom<JobRow> for TransferJob {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self> {
        Ok(TransferJob {
            id: JobId::from_string(&row.id)?,
            name: row.name,
            status: row.status.parse()?,
            total_count: row.total_count as u32,
            success_count: row.success_count as u32,
            fail_count: row.fail_count as u32,
            min_delay_secs: row.min_delay_secs as u32,
            max_delay_secs: row.max_delay_secs as u32,
            skip_count: row.skip_count as u32,
            position: row.position as u32,
            waiting: row.waiting != 0,
            created_at: row.created_at,
        })
    }
}

const JOB_COLUMNS: &str = "id, name, status, total_count, success_count, fail_count, \
                           min_delay_secs, max_delay_secs, skip_count, position, waiting, \
                           created_at";

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &TransferJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transfer_jobs (
                id, name, status, total_count, success_count, fail_count,
                min_delay_secs, max_delay_secs, skip_count, position, waiting, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id.as_str())
        .bind(&job.name)
        .bind(job.status.as_str())
        .bind(job.total_count as i64)
        .bind(job.success_count as i64)
        .bind(job.fail_count as i64)
        .bind(job.min_delay_secs as i64)
        .bind(job.max_delay_secs as i64)
        .bind(job.skip_count as i64)
        .bind(job.position as i64)
        .bind(job.waiting as i64)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<TransferJob>> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM transfer_jobs WHERE id = ?",
            JOB_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransferJob::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<TransferJob>> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM transfer_jobs ORDER BY created_at DESC",
            JOB_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransferJob::try_from).collect()
    }

    async fn update_status(&self, id: JobId, status: JobStatus) -> Result<()> {
        let result = sqlx::query("UPDATE transfer_jobs SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "TransferJob",
                id: id.as_str(),
            });
        }
        Ok(())
    }

    async fn update_start_params(&self, id: JobId, skip: u32, min: u32, max: u32) -> Result<()> {
        sqlx::query(
            "UPDATE transfer_jobs SET skip_count = ?, min_delay_secs = ?, max_delay_secs = ? \
             WHERE id = ?",
        )
        .bind(skip as i64)
        .bind(min as i64)
        .bind(max as i64)
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_waiting(&self, id: JobId, waiting: bool) -> Result<()> {
        sqlx::query("UPDATE transfer_jobs SET waiting = ? WHERE id = ?")
            .bind(waiting as i64)
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_position(&self, id: JobId, position: u32) -> Result<()> {
        sqlx::query("UPDATE transfer_jobs SET position = ? WHERE id = ?")
            .bind(position as i64)
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_counters(&self, id: JobId, success: u32, fail: u32) -> Result<()> {
        sqlx::query("UPDATE transfer_jobs SET success_count = ?, fail_count = ? WHERE id = ?")
            .bind(success as i64)
            .bind(fail as i64)
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_active(&self) -> Result<Option<TransferJob>> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM transfer_jobs \
             WHERE status IN ('running', 'pausing', 'cancelling') \
             ORDER BY created_at ASC LIMIT 1",
            JOB_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransferJob::try_from).transpose()
    }

    async fn oldest_queued(&self) -> Result<Option<TransferJob>> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM transfer_jobs WHERE status = 'queued' \
             ORDER BY created_at ASC LIMIT 1",
            JOB_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransferJob::try_from).transpose()
    }

    async fn reset_interrupted(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE transfer_jobs SET status = 'paused', waiting = 0 \
             WHERE status IN ('running', 'pausing', 'cancelling', 'queued')",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, id: JobId) -> Result<()> {
        sqlx::query("DELETE FROM transfer_jobs WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
