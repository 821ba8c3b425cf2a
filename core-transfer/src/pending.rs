//! # Pending-Transfer Long Poller
//!
//! Parked shares (auditing, snapshotting, throttled) are re-probed on a
//! long horizon: every five minutes, up to 36 attempts per record (about
//! three hours). Each probe goes through the single-flight queue like any
//! other transfer, so the poller never competes with active work for the
//! provider.
//!
//! The poller owns the pending rows: it bumps attempt bookkeeping, keeps
//! records that are still on hold, and deletes rows on terminal success,
//! permanent rejection, or attempt exhaustion.

use crate::config::EngineConfig;
use crate::error::{Result, TransferError};
use crate::pipeline::{PipelineOutcome, TransferPipeline};
use crate::queue::SingleFlightQueue;
use crate::throttle::ThrottleFlag;
use core_store::{PendingStatus, PendingTransfer, PendingTransferRepository};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct PendingPoller {
    pending: Arc<dyn PendingTransferRepository>,
    pipeline: Arc<TransferPipeline>,
    queue: SingleFlightQueue,
    throttle: Arc<ThrottleFlag>,
    interval: Duration,
    max_attempts: u32,
}

impl PendingPoller {
    pub fn new(
        pending: Arc<dyn PendingTransferRepository>,
        pipeline: Arc<TransferPipeline>,
        queue: SingleFlightQueue,
        throttle: Arc<ThrottleFlag>,
        cfg: &EngineConfig,
    ) -> Self {
        Self {
            pending,
            pipeline,
            queue,
            throttle,
            interval: cfg.pending_poll_interval,
            max_attempts: cfg.pending_max_attempts,
        }
    }

    /// Poll loop; runs until the shutdown token fires.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.poll_once().await {
                        warn!(error = %e, "pending poll pass failed");
                    }
                }
            }
        }
    }

    /// One pass over every parked share.
    pub async fn poll_once(&self) -> Result<()> {
        for record in self.pending.list().await? {
            // throttled shares stay parked until the flag expires
            if record.status == PendingStatus::Restricted && self.throttle.is_active() {
                continue;
            }
            self.poll_record(&record).await?;
        }
        Ok(())
    }

    async fn poll_record(&self, record: &PendingTransfer) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        self.pending.record_attempt(record.id, now).await?;
        let attempts_now = record.attempts + 1;

        let pipeline = Arc::clone(&self.pipeline);
        let source = record.source.clone();
        let metadata = record.metadata.clone();
        let result = self
            .queue
            .submit(format!("pending-{}", record.source), async move {
                pipeline.run_parked(&source, &metadata).await
            })
            .await?;

        match result {
            Ok(PipelineOutcome::Published { links }) | Ok(PipelineOutcome::CachedHit { links }) => {
                info!(share = %record.source, links = links.len(), "parked share resolved");
                self.pending.delete(record.id).await?;
            }
            Ok(PipelineOutcome::Parked { status }) => {
                if attempts_now >= self.max_attempts {
                    warn!(
                        share = %record.source,
                        attempts = attempts_now,
                        "parked share never released, giving up"
                    );
                    self.pending.delete(record.id).await?;
                } else if status != record.status {
                    self.pending.set_status(record.id, status).await?;
                }
            }
            Ok(PipelineOutcome::NotYetVisible) => {
                if attempts_now >= self.max_attempts {
                    self.pending.delete(record.id).await?;
                }
            }
            Err(TransferError::PermanentRejection { state, .. }) => {
                warn!(share = %record.source, state, "parked share rejected permanently");
                self.pending.delete(record.id).await?;
            }
            Err(e) => {
                warn!(share = %record.source, error = %e, "parked share probe failed");
                if attempts_now >= self.max_attempts {
                    self.pending.delete(record.id).await?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::CapacityMonitor;
    use crate::retry::RetryPolicy;
    use crate::test_stub::StubClient;
    use core_store::db::create_test_pool;
    use core_store::{
        LinkHistoryRepository, SqliteLinkHistoryRepository, SqlitePendingTransferRepository,
    };
    use provider_traits::{
        CloudClient, NullNotifier, RemoteEntry, ShareAvailability, ShareRef, ShareSnapshot,
    };
    use serde_json::json;

    struct Fixture {
        client: Arc<StubClient>,
        poller: PendingPoller,
        pending: Arc<SqlitePendingTransferRepository>,
        history: Arc<SqliteLinkHistoryRepository>,
        throttle: Arc<ThrottleFlag>,
    }

    async fn fixture(max_attempts: u32) -> Fixture {
        let pool = create_test_pool().await.unwrap();
        let client = Arc::new(StubClient::new());
        let throttle = Arc::new(ThrottleFlag::new(Duration::from_secs(3600)));
        let history = Arc::new(SqliteLinkHistoryRepository::new(pool.clone()));
        let pending = Arc::new(SqlitePendingTransferRepository::new(pool));

        let cfg = EngineConfig {
            stabilize_attempts: 2,
            stabilize_interval: Duration::from_millis(1),
            pending_max_attempts: max_attempts,
            ..EngineConfig::default()
        };
        let capacity = Arc::new(CapacityMonitor::new(
            Arc::clone(&client) as Arc<dyn CloudClient>,
            RetryPolicy::from_config(&cfg),
            "/share-saves",
            None,
            None,
            0.10,
        ));
        let pipeline = Arc::new(crate::pipeline::TransferPipeline::new(
            Arc::clone(&client) as Arc<dyn CloudClient>,
            capacity,
            Arc::clone(&throttle),
            Arc::clone(&history) as Arc<dyn LinkHistoryRepository>,
            Arc::clone(&pending) as Arc<dyn PendingTransferRepository>,
            Arc::new(NullNotifier),
            &cfg,
            "https://115.com/s",
        ));
        let poller = PendingPoller::new(
            Arc::clone(&pending) as Arc<dyn PendingTransferRepository>,
            pipeline,
            SingleFlightQueue::start(),
            Arc::clone(&throttle),
            &cfg,
        );

        Fixture {
            client,
            poller,
            pending,
            history,
            throttle,
        }
    }

    fn ready_share(n: usize) -> ShareSnapshot {
        ShareSnapshot {
            availability: ShareAvailability::Ready,
            entries: (0..n)
                .map(|i| RemoteEntry::file(format!("f{}", i), format!("file{}.mkv", i), 100))
                .collect(),
            total_files: Some(n as u64),
            total_bytes: Some(100 * n as u64),
        }
    }

    #[tokio::test]
    async fn test_released_share_resolves_and_row_is_deleted() {
        let fx = fixture(36).await;
        fx.pending
            .insert(&ShareRef::new("sw1"), &json!({}), PendingStatus::Auditing)
            .await
            .unwrap();
        fx.client.push_snapshot(Ok(ready_share(2)));
        fx.client.push_listing(vec![
            RemoteEntry::file("r0", "file0.mkv", 100),
            RemoteEntry::file("r1", "file1.mkv", 100),
        ]);

        fx.poller.poll_once().await.unwrap();

        assert_eq!(fx.pending.count().await.unwrap(), 0);
        assert!(fx.history.find_by_source("sw1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_still_auditing_keeps_row_and_bumps_attempts() {
        let fx = fixture(36).await;
        fx.pending
            .insert(&ShareRef::new("sw1"), &json!({}), PendingStatus::Auditing)
            .await
            .unwrap();
        fx.client.push_snapshot(Ok(ShareSnapshot {
            availability: ShareAvailability::Auditing,
            entries: vec![],
            total_files: None,
            total_bytes: None,
        }));

        fx.poller.poll_once().await.unwrap();

        let rows = fx.pending.list().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_restricted_rows_skipped_while_throttled() {
        let fx = fixture(36).await;
        fx.pending
            .insert(&ShareRef::new("sw1"), &json!({}), PendingStatus::Restricted)
            .await
            .unwrap();
        fx.throttle.engage();

        fx.poller.poll_once().await.unwrap();

        let rows = fx.pending.list().await.unwrap();
        assert_eq!(rows[0].attempts, 0);
        assert!(fx.client.receive_batches().is_empty());
    }

    #[tokio::test]
    async fn test_attempt_exhaustion_gives_up() {
        let fx = fixture(2).await;
        fx.pending
            .insert(&ShareRef::new("sw1"), &json!({}), PendingStatus::Auditing)
            .await
            .unwrap();
        for _ in 0..2 {
            fx.client.push_snapshot(Ok(ShareSnapshot {
                availability: ShareAvailability::Auditing,
                entries: vec![],
                total_files: None,
                total_bytes: None,
            }));
        }

        fx.poller.poll_once().await.unwrap();
        assert_eq!(fx.pending.count().await.unwrap(), 1);

        fx.poller.poll_once().await.unwrap();
        assert_eq!(fx.pending.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_permanent_rejection_deletes_row() {
        let fx = fixture(36).await;
        fx.pending
            .insert(&ShareRef::new("sw1"), &json!({}), PendingStatus::Auditing)
            .await
            .unwrap();
        fx.client.push_snapshot(Ok(ShareSnapshot {
            availability: ShareAvailability::Expired,
            entries: vec![],
            total_files: None,
            total_bytes: None,
        }));

        fx.poller.poll_once().await.unwrap();

        assert_eq!(fx.pending.count().await.unwrap(), 0);
    }
}
