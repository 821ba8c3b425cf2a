//! # Transfer Engine Facade
//!
//! Constructs and owns every component of the transfer subsystem and
//! exposes the surface the API layer consumes. All service state lives in
//! explicit structs built once here; the only shared mutable pieces are
//! the single-flight queue and the throttle flag.

use crate::capacity::{CapacityMonitor, CheckMode};
use crate::config::EngineConfig;
use crate::controller::{JobController, JobReport};
use crate::error::Result;
use crate::pending::PendingPoller;
use crate::pipeline::{PipelineOutcome, TransferPipeline};
use crate::queue::SingleFlightQueue;
use crate::retry::RetryPolicy;
use crate::throttle::ThrottleFlag;
use core_runtime::CoreConfig;
use core_store::{
    init_schema, JobId, JobStatus, LinkHistoryRepository, LinkRecord, NewItem,
    SqliteItemRepository, SqliteJobRepository, SqliteLinkHistoryRepository,
    SqlitePendingTransferRepository, TransferItem, TransferJob,
};
use provider_traits::{CloudClient, Notifier, ShareRef, SpaceInfo};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct TransferEngine {
    queue: SingleFlightQueue,
    throttle: Arc<ThrottleFlag>,
    capacity: Arc<CapacityMonitor>,
    pipeline: Arc<TransferPipeline>,
    controller: Arc<JobController>,
    poller: Arc<PendingPoller>,
    history: Arc<dyn LinkHistoryRepository>,
    cleanup_dir_interval: Duration,
    cleanup_trash_interval: Duration,
    shutdown: CancellationToken,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl TransferEngine {
    /// Wire up the engine against an open database pool and the external
    /// collaborators. Creates the schema when missing.
    pub async fn new(
        core_cfg: &CoreConfig,
        engine_cfg: EngineConfig,
        pool: SqlitePool,
        client: Arc<dyn CloudClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        init_schema(&pool).await?;

        let queue = SingleFlightQueue::start();
        let throttle = Arc::new(ThrottleFlag::new(engine_cfg.throttle_ttl));
        let shutdown = CancellationToken::new();

        let jobs = Arc::new(SqliteJobRepository::new(pool.clone()));
        let items = Arc::new(SqliteItemRepository::new(pool.clone()));
        let history = Arc::new(SqliteLinkHistoryRepository::new(pool.clone()));
        let pending = Arc::new(SqlitePendingTransferRepository::new(pool));

        let capacity = Arc::new(CapacityMonitor::new(
            Arc::clone(&client),
            RetryPolicy::from_config(&engine_cfg),
            core_cfg.managed_dir.clone(),
            core_cfg.capacity_threshold_bytes,
            core_cfg.trash_password.clone(),
            engine_cfg.batch_free_floor,
        ));

        let pipeline = Arc::new(TransferPipeline::new(
            client,
            Arc::clone(&capacity),
            Arc::clone(&throttle),
            Arc::clone(&history) as Arc<dyn LinkHistoryRepository>,
            Arc::clone(&pending) as Arc<dyn core_store::PendingTransferRepository>,
            notifier,
            &engine_cfg,
            core_cfg.share_link_base.clone(),
        ));

        let controller = JobController::new(
            jobs,
            items,
            Arc::clone(&pipeline),
            queue.clone(),
            Arc::clone(&capacity),
            &engine_cfg,
            shutdown.child_token(),
        );

        let poller = Arc::new(PendingPoller::new(
            pending as Arc<dyn core_store::PendingTransferRepository>,
            Arc::clone(&pipeline),
            queue.clone(),
            Arc::clone(&throttle),
            &engine_cfg,
        ));

        Ok(Self {
            queue,
            throttle,
            capacity,
            pipeline,
            controller,
            poller,
            history,
            cleanup_dir_interval: Duration::from_secs(core_cfg.cleanup_dir_interval_secs),
            cleanup_trash_interval: Duration::from_secs(core_cfg.cleanup_trash_interval_secs),
            shutdown,
            tasks: std::sync::Mutex::new(Vec::new()),
        })
    }

    /// Recover interrupted state and spawn the background tasks: job
    /// driver, pending long poller, periodic cleanups.
    pub async fn start(&self) -> Result<()> {
        self.controller.recover().await?;

        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(JobController::spawn_driver(&self.controller));
        tasks.push(tokio::spawn(
            Arc::clone(&self.poller).run(self.shutdown.child_token()),
        ));
        tasks.push(self.spawn_dir_cleanup());
        tasks.push(self.spawn_trash_cleanup());

        info!("transfer engine started");
        Ok(())
    }

    /// Run one ad-hoc transfer through the queue.
    pub async fn submit_share(
        &self,
        source: ShareRef,
        metadata: serde_json::Value,
    ) -> Result<PipelineOutcome> {
        let pipeline = Arc::clone(&self.pipeline);
        self.queue
            .submit(format!("transfer-{}", source), async move {
                pipeline.run(&source, &metadata).await
            })
            .await?
    }

    // ------------------------------------------------------------------
    // Job API
    // ------------------------------------------------------------------

    pub async fn create_job(&self, name: &str, items: Vec<NewItem>) -> Result<JobId> {
        self.controller.create_job(name, items).await
    }

    pub async fn start_job(
        &self,
        id: JobId,
        skip: u32,
        min_delay_secs: u32,
        max_delay_secs: u32,
    ) -> Result<JobStatus> {
        self.controller
            .start_job(id, skip, min_delay_secs, max_delay_secs)
            .await
    }

    pub async fn pause_job(&self, id: JobId) -> Result<()> {
        self.controller.pause_job(id).await
    }

    pub async fn cancel_job(&self, id: JobId) -> Result<()> {
        self.controller.cancel_job(id).await
    }

    pub async fn delete_job(&self, id: JobId) -> Result<()> {
        self.controller.delete_job(id).await
    }

    pub async fn job_status(&self, id: JobId) -> Result<JobReport> {
        self.controller.job_status(id).await
    }

    pub async fn job_items(&self, id: JobId) -> Result<Vec<TransferItem>> {
        self.controller.job_items(id).await
    }

    pub async fn list_jobs(&self) -> Result<Vec<TransferJob>> {
        self.controller.list_jobs().await
    }

    // ------------------------------------------------------------------
    // Capacity & history API
    // ------------------------------------------------------------------

    /// Current storage usage (read-only, bypasses the queue).
    pub async fn check_capacity_now(&self) -> Result<SpaceInfo> {
        self.capacity.stats().await
    }

    /// Operator-requested cleanup; always cleans.
    pub async fn cleanup_now(&self) -> Result<()> {
        let capacity = Arc::clone(&self.capacity);
        self.queue
            .submit("manual-cleanup", async move {
                capacity.check_and_cleanup(CheckMode::Manual).await
            })
            .await??;
        Ok(())
    }

    /// Periodic cleanup pass: skips itself entirely while the queue is
    /// busy or the provider is throttling.
    pub async fn scheduled_cleanup(&self) -> Result<bool> {
        if self.queue.is_busy() || self.throttle.is_active() {
            debug!("scheduled cleanup skipped, queue busy or throttled");
            return Ok(false);
        }
        let capacity = Arc::clone(&self.capacity);
        self.queue
            .submit("scheduled-cleanup", async move {
                capacity.check_and_cleanup(CheckMode::Scheduled).await
            })
            .await?
    }

    pub async fn link_history(&self, limit: u32) -> Result<Vec<LinkRecord>> {
        Ok(self.history.list_recent(limit).await?)
    }

    pub async fn clear_link_history(&self) -> Result<u64> {
        Ok(self.history.clear().await?)
    }

    /// One pass of the pending long poller (exposed for the API layer's
    /// "retry parked now" action).
    pub async fn poll_pending_now(&self) -> Result<()> {
        self.poller.poll_once().await
    }

    /// Graceful shutdown: stop pulling work, reset job state, wait bounded
    /// for the item in flight, then stop the background tasks.
    pub async fn shutdown(&self) {
        self.controller.shutdown().await;
        self.shutdown.cancel();

        let tasks = {
            let mut guard = self.tasks.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        for task in tasks {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "background task ended abnormally");
                }
            }
        }
        info!("transfer engine stopped");
    }

    // ------------------------------------------------------------------
    // Periodic drivers
    // ------------------------------------------------------------------

    fn spawn_dir_cleanup(&self) -> JoinHandle<()> {
        let queue = self.queue.clone();
        let throttle = Arc::clone(&self.throttle);
        let capacity = Arc::clone(&self.capacity);
        let shutdown = self.shutdown.child_token();
        let interval = self.cleanup_dir_interval;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                if queue.is_busy() || throttle.is_active() {
                    debug!("scheduled directory cleanup skipped");
                    continue;
                }
                let capacity = Arc::clone(&capacity);
                let result = queue
                    .submit("scheduled-cleanup", async move {
                        capacity.check_and_cleanup(CheckMode::Scheduled).await
                    })
                    .await;
                match result {
                    Ok(Err(e)) => warn!(error = %e, "scheduled cleanup failed"),
                    Err(e) => warn!(error = %e, "scheduled cleanup not submitted"),
                    Ok(Ok(_)) => {}
                }
            }
        })
    }

    fn spawn_trash_cleanup(&self) -> JoinHandle<()> {
        let queue = self.queue.clone();
        let throttle = Arc::clone(&self.throttle);
        let capacity = Arc::clone(&self.capacity);
        let shutdown = self.shutdown.child_token();
        let interval = self.cleanup_trash_interval;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                if queue.is_busy() || throttle.is_active() {
                    debug!("scheduled trash emptying skipped");
                    continue;
                }
                let capacity = Arc::clone(&capacity);
                let result = queue
                    .submit("scheduled-trash", async move { capacity.empty_trash().await })
                    .await;
                match result {
                    Ok(Err(e)) => warn!(error = %e, "scheduled trash emptying failed"),
                    Err(e) => warn!(error = %e, "scheduled trash emptying not submitted"),
                    Ok(Ok(())) => {}
                }
            }
        })
    }
}
