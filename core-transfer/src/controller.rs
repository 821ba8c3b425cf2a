//! # Batch Job Controller
//!
//! Drives persisted transfer jobs through the single-flight queue.
//!
//! ## Overview
//!
//! A job is an ordered list of items processed strictly in position order.
//! Only one job holds the running slot at a time; later `start` requests
//! park as `queued` and the background driver promotes the oldest queued
//! job when the slot frees up. Between items the driver sleeps a jitter
//! within the job's configured bounds, reusing the idle window for a
//! batch-mode capacity check.
//!
//! ## Two-phase pause/cancel
//!
//! Pause and cancel first set a transitional state (`pausing`/`cancelling`)
//! so the driver stops pulling new items, then wait (bounded) for the item
//! in flight to settle, then commit the final state. Collapsing this into a
//! single write reintroduces the race where an in-flight item settles after
//! the pause and flips counters under a supposedly frozen job.
//!
//! ## Crash recovery
//!
//! On startup any job found `running`/`pausing`/`cancelling`/`queued` is
//! forced to `paused` and any `processing` item reset to `pending`, so an
//! unclean shutdown never wedges a job in an in-flight state.

use crate::capacity::{CapacityMonitor, CheckMode};
use crate::config::EngineConfig;
use crate::error::{Result, TransferError};
use crate::pipeline::{PipelineOutcome, TransferPipeline};
use crate::queue::SingleFlightQueue;
use core_store::{
    ItemCounts, ItemRepository, ItemStatus, JobId, JobRepository, JobStatus, NewItem,
    TransferItem, TransferJob,
};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Job snapshot returned to the API layer
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: TransferJob,
    pub counts: ItemCounts,
}

enum Progress {
    Worked,
    Idle,
}

pub struct JobController {
    jobs: Arc<dyn JobRepository>,
    items: Arc<dyn ItemRepository>,
    pipeline: Arc<TransferPipeline>,
    queue: SingleFlightQueue,
    capacity: Arc<CapacityMonitor>,
    settle_timeout: Duration,
    shutdown_settle_timeout: Duration,
    wake: Notify,
    inflight: AtomicBool,
    settled: Notify,
    shutdown: CancellationToken,
}

impl JobController {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        items: Arc<dyn ItemRepository>,
        pipeline: Arc<TransferPipeline>,
        queue: SingleFlightQueue,
        capacity: Arc<CapacityMonitor>,
        cfg: &EngineConfig,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            jobs,
            items,
            pipeline,
            queue,
            capacity,
            settle_timeout: cfg.settle_timeout,
            shutdown_settle_timeout: cfg.shutdown_settle_timeout,
            wake: Notify::new(),
            inflight: AtomicBool::new(false),
            settled: Notify::new(),
            shutdown,
        })
    }

    // ------------------------------------------------------------------
    // API surface
    // ------------------------------------------------------------------

    /// Create a job in `wait` state with its items.
    pub async fn create_job(&self, name: impl Into<String>, items: Vec<NewItem>) -> Result<JobId> {
        let job = TransferJob::new(name, items.len() as u32);
        self.jobs.insert(&job).await?;
        self.items.insert_batch(job.id, &items).await?;
        info!(job_id = %job.id, total = job.total_count, "job created");
        Ok(job.id)
    }

    /// Start or resume a job.
    ///
    /// On a fresh start, items at positions up to `skip` are marked
    /// `skipped` and the rest `pending`; resuming a paused job leaves item
    /// statuses untouched. The job takes the running slot if free,
    /// otherwise parks as `queued`.
    pub async fn start_job(
        &self,
        id: JobId,
        skip: u32,
        min_delay_secs: u32,
        max_delay_secs: u32,
    ) -> Result<JobStatus> {
        let job = self.require_job(id).await?;
        if !job.status.is_startable() {
            return Err(TransferError::InvalidTransition {
                from: job.status.to_string(),
                to: JobStatus::Running.to_string(),
            });
        }

        let min = min_delay_secs.min(max_delay_secs);
        let max = min_delay_secs.max(max_delay_secs);
        self.jobs.update_start_params(id, skip, min, max).await?;

        if job.status == JobStatus::Wait {
            self.items.apply_skip(id, skip).await?;
            self.refresh_counters(id).await?;
        }

        let target = if self.jobs.find_active().await?.is_some() {
            JobStatus::Queued
        } else {
            JobStatus::Running
        };
        self.jobs.update_status(id, target).await?;
        self.wake.notify_one();
        info!(job_id = %id, status = %target, skip, "job started");
        Ok(target)
    }

    /// Two-phase pause: transitional `pausing`, bounded wait for the item
    /// in flight, then commit `paused`.
    pub async fn pause_job(&self, id: JobId) -> Result<()> {
        let job = self.require_job(id).await?;
        match job.status {
            JobStatus::Running | JobStatus::Pausing => {
                self.jobs.update_status(id, JobStatus::Pausing).await?;
                if !self.wait_settled(self.settle_timeout).await {
                    warn!(job_id = %id, "in-flight item did not settle before the pause deadline");
                }
                self.jobs.update_status(id, JobStatus::Paused).await?;
                self.jobs.set_waiting(id, false).await?;
                self.wake.notify_one();
                info!(job_id = %id, "job paused");
                Ok(())
            }
            JobStatus::Queued => {
                self.jobs.update_status(id, JobStatus::Paused).await?;
                Ok(())
            }
            JobStatus::Paused => Ok(()),
            other => Err(TransferError::InvalidTransition {
                from: other.to_string(),
                to: JobStatus::Paused.to_string(),
            }),
        }
    }

    /// Two-phase cancel, mirroring pause.
    pub async fn cancel_job(&self, id: JobId) -> Result<()> {
        let job = self.require_job(id).await?;
        match job.status {
            JobStatus::Running | JobStatus::Pausing | JobStatus::Cancelling => {
                self.jobs.update_status(id, JobStatus::Cancelling).await?;
                if !self.wait_settled(self.settle_timeout).await {
                    warn!(job_id = %id, "in-flight item did not settle before the cancel deadline");
                }
                self.jobs.update_status(id, JobStatus::Cancelled).await?;
                self.jobs.set_waiting(id, false).await?;
                self.wake.notify_one();
                info!(job_id = %id, "job cancelled");
                Ok(())
            }
            JobStatus::Wait | JobStatus::Queued | JobStatus::Paused => {
                self.jobs.update_status(id, JobStatus::Cancelled).await?;
                Ok(())
            }
            JobStatus::Cancelled => Ok(()),
            other => Err(TransferError::InvalidTransition {
                from: other.to_string(),
                to: JobStatus::Cancelled.to_string(),
            }),
        }
    }

    /// Delete a job and its items. Active jobs must be paused or cancelled
    /// first.
    pub async fn delete_job(&self, id: JobId) -> Result<()> {
        let job = self.require_job(id).await?;
        if job.status == JobStatus::Running || job.status.is_transitional() {
            return Err(TransferError::JobActive(id.to_string()));
        }
        self.jobs.delete(id).await?;
        info!(job_id = %id, "job deleted");
        Ok(())
    }

    /// Current job state plus its item-status histogram.
    pub async fn job_status(&self, id: JobId) -> Result<JobReport> {
        let job = self.require_job(id).await?;
        let counts = self.items.counts(id).await?;
        Ok(JobReport { job, counts })
    }

    /// All jobs, most recent first.
    pub async fn list_jobs(&self) -> Result<Vec<TransferJob>> {
        Ok(self.jobs.list().await?)
    }

    /// Items of a job in position order.
    pub async fn job_items(&self, id: JobId) -> Result<Vec<TransferItem>> {
        self.require_job(id).await?;
        Ok(self.items.list_for_job(id).await?)
    }

    // ------------------------------------------------------------------
    // Recovery & shutdown
    // ------------------------------------------------------------------

    /// Reset interrupted state after an unclean restart. Returns
    /// `(jobs_reset, items_reset)`.
    pub async fn recover(&self) -> Result<(u64, u64)> {
        let jobs_reset = self.jobs.reset_interrupted().await?;
        let items_reset = self.items.reset_processing().await?;
        if jobs_reset > 0 || items_reset > 0 {
            info!(jobs_reset, items_reset, "recovered interrupted jobs");
        }
        Ok((jobs_reset, items_reset))
    }

    /// Graceful shutdown: stop the driver, reset job state proactively,
    /// then wait (bounded) for the item in flight.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.wake.notify_waiters();

        if let Err(e) = self.jobs.reset_interrupted().await {
            error!(error = %e, "job reset during shutdown failed");
        }
        if !self.wait_settled(self.shutdown_settle_timeout).await {
            warn!("in-flight item did not settle before the shutdown deadline");
        }
        if let Err(e) = self.items.reset_processing().await {
            error!(error = %e, "item reset during shutdown failed");
        }
    }

    // ------------------------------------------------------------------
    // Driver
    // ------------------------------------------------------------------

    /// Spawn the background driver loop.
    pub fn spawn_driver(this: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(this);
        tokio::spawn(async move { controller.drive_loop().await })
    }

    async fn drive_loop(self: Arc<Self>) {
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            match self.drive_once().await {
                Ok(Progress::Worked) => {}
                Ok(Progress::Idle) => {
                    tokio::select! {
                        _ = self.wake.notified() => {}
                        _ = self.shutdown.cancelled() => break,
                    }
                }
                Err(e) => {
                    error!(error = %e, "driver pass failed");
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                        _ = self.shutdown.cancelled() => break,
                    }
                }
            }
        }
    }

    async fn drive_once(&self) -> Result<Progress> {
        let Some(job) = self.jobs.find_active().await? else {
            if let Some(queued) = self.jobs.oldest_queued().await? {
                info!(job_id = %queued.id, "promoting queued job to the running slot");
                self.jobs.update_status(queued.id, JobStatus::Running).await?;
                return Ok(Progress::Worked);
            }
            return Ok(Progress::Idle);
        };

        if job.status != JobStatus::Running {
            // pausing/cancelling: the requester owns the settle; stop pulling
            return Ok(Progress::Idle);
        }

        let Some(item) = self.items.next_pending(job.id).await? else {
            self.refresh_counters(job.id).await?;
            self.jobs.update_status(job.id, JobStatus::Completed).await?;
            info!(job_id = %job.id, "job completed");
            return Ok(Progress::Worked);
        };

        self.process_item(&job, &item).await?;

        let still_running = matches!(
            self.jobs.find_by_id(job.id).await?.map(|j| j.status),
            Some(JobStatus::Running)
        );
        if still_running {
            self.between_items(&job).await?;
        }
        Ok(Progress::Worked)
    }

    async fn process_item(&self, job: &TransferJob, item: &TransferItem) -> Result<()> {
        info!(job_id = %job.id, position = item.position, share = %item.source, "processing item");
        self.items.set_status(item.id, ItemStatus::Processing).await?;
        self.jobs.set_position(job.id, item.position).await?;

        self.inflight.store(true, Ordering::SeqCst);
        let settle_result = self.run_item(job, item).await;
        self.inflight.store(false, Ordering::SeqCst);
        self.settled.notify_waiters();

        settle_result
    }

    async fn run_item(&self, job: &TransferJob, item: &TransferItem) -> Result<()> {
        let pipeline = Arc::clone(&self.pipeline);
        let source = item.source.clone();
        let metadata = serde_json::json!({
            "job": job.name,
            "position": item.position,
            "title": item.title,
        });

        let result = self
            .queue
            .submit(format!("job-{}-item-{}", job.id, item.position), async move {
                pipeline.run(&source, &metadata).await
            })
            .await;

        let (status, links, note) = match result {
            Ok(Ok(outcome)) => match outcome {
                PipelineOutcome::Published { links } | PipelineOutcome::CachedHit { links } => {
                    (ItemStatus::Success, links, None)
                }
                PipelineOutcome::Parked { status } => (
                    // queued on the provider side; the long poller publishes
                    // the link once the hold clears
                    ItemStatus::Success,
                    Vec::new(),
                    Some(format!("parked: {}", status)),
                ),
                PipelineOutcome::NotYetVisible => (
                    ItemStatus::Skipped,
                    Vec::new(),
                    Some("received but not yet visible".to_string()),
                ),
            },
            Ok(Err(e)) | Err(e) => (ItemStatus::Failed, Vec::new(), Some(e.to_string())),
        };

        if status == ItemStatus::Failed {
            warn!(
                job_id = %job.id,
                position = item.position,
                error = note.as_deref().unwrap_or(""),
                "item failed"
            );
        }
        self.items
            .record_outcome(item.id, status, &links, note.as_deref())
            .await?;
        self.refresh_counters(job.id).await
    }

    /// Jittered inter-item sleep; the idle window doubles as the
    /// batch-mode capacity check.
    async fn between_items(&self, job: &TransferJob) -> Result<()> {
        self.jobs.set_waiting(job.id, true).await?;

        let lo = u64::from(job.min_delay_secs) * 1000;
        let hi = u64::from(job.max_delay_secs) * 1000;
        let pause_ms = if hi > lo {
            rand::thread_rng().gen_range(lo..=hi)
        } else {
            lo
        };

        let capacity = Arc::clone(&self.capacity);
        let check = self.queue.submit("batch-capacity-check", async move {
            capacity.check_and_cleanup(CheckMode::Batch).await
        });
        let wait = async {
            let (_, check_result) = tokio::join!(
                tokio::time::sleep(Duration::from_millis(pause_ms)),
                check
            );
            match check_result {
                Ok(Err(e)) => warn!(error = %e, "batch capacity check failed"),
                Err(e) => warn!(error = %e, "batch capacity check not submitted"),
                Ok(Ok(_)) => {}
            }
        };

        tokio::select! {
            _ = wait => {}
            _ = self.shutdown.cancelled() => {}
        }

        self.jobs.set_waiting(job.id, false).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn require_job(&self, id: JobId) -> Result<TransferJob> {
        self.jobs
            .find_by_id(id)
            .await?
            .ok_or_else(|| TransferError::JobNotFound(id.to_string()))
    }

    async fn refresh_counters(&self, id: JobId) -> Result<()> {
        let counts = self.items.counts(id).await?;
        Ok(self
            .jobs
            .update_counters(id, counts.success, counts.failed)
            .await?)
    }

    /// Wait for the in-flight item to settle, bounded. Returns whether it
    /// settled in time.
    async fn wait_settled(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.settled.notified();
            if !self.inflight.load(Ordering::SeqCst) {
                return true;
            }
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(deadline) => return false,
            }
        }
    }
}
