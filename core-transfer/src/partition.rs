//! # Recursive Partitioner
//!
//! Transfers a share whose flat item count exceeds the provider's per-call
//! receive ceiling. The share's folder tree is walked depth-first, each
//! folder recreated under the destination, and files received in bounded
//! batches with a short jittered pause between calls.
//!
//! When the running file total reaches a checkpoint, or utilization climbs
//! past the ceiling mid-walk, everything received so far is published as an
//! intermediate permanent link and a full cleanup reclaims the space; the
//! walk then resumes from its current tree position with freshly recreated
//! destination folders.
//!
//! A failed batch is logged and the walk continues; the caller treats the
//! transfer as failed only if zero links result overall.

use crate::capacity::CapacityMonitor;
use crate::config::EngineConfig;
use crate::error::{Result, TransferError};
use crate::publish::publish_permanent;
use crate::retry::{call_with_retry, RetryPolicy};
use provider_traits::{CloudClient, RemoteEntry, ShareRef};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Limits governing one partitioned transfer
#[derive(Debug, Clone)]
pub struct PartitionConfig {
    /// Files per receive call
    pub receive_ceiling: usize,
    /// Files between intermediate checkpoint publishes
    pub checkpoint_files: u64,
    /// Utilization that forces a checkpoint mid-walk
    pub utilization_ceiling: f64,
    /// Jitter bounds for the pause between batches
    pub pause_min: Duration,
    pub pause_max: Duration,
    /// Items per published share before splitting
    pub share_split_ceiling: usize,
}

impl PartitionConfig {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            receive_ceiling: cfg.receive_ceiling,
            checkpoint_files: cfg.partition_checkpoint,
            utilization_ceiling: cfg.partition_utilization_ceiling,
            pause_min: cfg.partition_pause_min,
            pause_max: cfg.partition_pause_max,
            share_split_ceiling: cfg.share_split_ceiling,
        }
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// What a partitioned transfer produced
#[derive(Debug, Default)]
pub struct PartitionOutcome {
    /// Links published at checkpoints; the remainder still sitting in the
    /// destination is published by the caller's normal publish step
    pub intermediate_links: Vec<String>,
    pub received_files: u64,
    pub batches: u64,
    pub failed_batches: u64,
}

pub struct Partitioner<'a> {
    pub client: &'a dyn CloudClient,
    pub capacity: &'a CapacityMonitor,
    pub policy: &'a RetryPolicy,
    pub cfg: &'a PartitionConfig,
    pub link_base: &'a str,
}

impl<'a> Partitioner<'a> {
    /// Walk the share from its top-level entries and receive everything.
    pub async fn run(
        &self,
        share: &ShareRef,
        root_entries: &[RemoteEntry],
    ) -> Result<PartitionOutcome> {
        let mut out = PartitionOutcome::default();
        let mut since_checkpoint: u64 = 0;

        // (children to process, destination path) frames; dirs are pushed in
        // reverse so the walk visits them in listing order
        let mut stack: Vec<(Vec<RemoteEntry>, String)> = vec![(
            root_entries.to_vec(),
            self.capacity.managed_path().to_string(),
        )];

        while let Some((children, dest_path)) = stack.pop() {
            let mut dest_id =
                call_with_retry(self.policy, || self.client.create_folder(&dest_path)).await?;

            let files: Vec<&RemoteEntry> = children.iter().filter(|e| !e.is_dir).collect();
            for chunk in files.chunks(self.cfg.receive_ceiling.max(1)) {
                if out.batches > 0 {
                    self.pause_between_batches().await;
                }

                let ids: Vec<String> = chunk.iter().map(|e| e.id.clone()).collect();
                match call_with_retry(self.policy, || self.client.receive(share, &ids, &dest_id))
                    .await
                {
                    Ok(()) => {
                        out.received_files += ids.len() as u64;
                        since_checkpoint += ids.len() as u64;
                    }
                    Err(TransferError::Provider(e)) if e.is_duplicate_receive() => {
                        // the provider already holds these; count them received
                        out.received_files += ids.len() as u64;
                        since_checkpoint += ids.len() as u64;
                    }
                    Err(e) => {
                        warn!(
                            dest = %dest_path,
                            batch_size = ids.len(),
                            error = %e,
                            "partition batch failed, continuing with the rest"
                        );
                        out.failed_batches += 1;
                    }
                }
                out.batches += 1;

                if self.checkpoint_due(since_checkpoint).await {
                    let links = self.checkpoint().await?;
                    info!(
                        links = links.len(),
                        received = out.received_files,
                        "intermediate checkpoint published"
                    );
                    out.intermediate_links.extend(links);
                    since_checkpoint = 0;
                    // cleanup removed the destination; recreate for the
                    // remaining batches of this folder
                    dest_id =
                        call_with_retry(self.policy, || self.client.create_folder(&dest_path))
                            .await?;
                }
            }

            for dir in children.iter().filter(|e| e.is_dir).rev() {
                let grandchildren = call_with_retry(self.policy, || {
                    self.client.list_share_dir(share, &dir.id)
                })
                .await?;
                stack.push((grandchildren, format!("{}/{}", dest_path, dir.name)));
            }
        }

        Ok(out)
    }

    async fn checkpoint_due(&self, since_checkpoint: u64) -> bool {
        if since_checkpoint == 0 {
            return false;
        }
        if since_checkpoint >= self.cfg.checkpoint_files {
            return true;
        }
        match self.capacity.stats().await {
            Ok(space) => space.utilization() > self.cfg.utilization_ceiling,
            Err(e) => {
                warn!(error = %e, "space probe failed mid-walk, skipping utilization check");
                false
            }
        }
    }

    /// Publish the destination root's current content, then reclaim space.
    async fn checkpoint(&self) -> Result<Vec<String>> {
        let root_id = self.capacity.managed_dir_id().await?;
        let entries = call_with_retry(self.policy, || self.client.list_folder(&root_id)).await?;
        let ids: Vec<String> = entries.into_iter().map(|e| e.id).collect();

        let links = if ids.is_empty() {
            Vec::new()
        } else {
            publish_permanent(
                self.client,
                self.policy,
                &ids,
                self.cfg.share_split_ceiling,
                self.link_base,
            )
            .await?
        };

        self.capacity.cleanup().await?;
        Ok(links)
    }

    async fn pause_between_batches(&self) {
        let (lo, hi) = (
            self.cfg.pause_min.as_millis() as u64,
            self.cfg.pause_max.as_millis() as u64,
        );
        let pause = if hi > lo {
            rand::thread_rng().gen_range(lo..=hi)
        } else {
            lo
        };
        tokio::time::sleep(Duration::from_millis(pause)).await;
    }
}
