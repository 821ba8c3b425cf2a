//! # Transfer-and-Publish Pipeline
//!
//! The operation the single-flight queue executes for every transfer
//! request: consult the link-history cache, probe the share, make room,
//! receive, wait for the destination to stabilize, publish permanent
//! links, record them, and notify the broadcaster.
//!
//! Non-ready shares are parked as pending transfers for the long poller;
//! duplicate-receive signals are salvaged by checking whether the items
//! already landed (retrying once into a fresh sibling folder when they
//! did not); a limit-exceeded signal hands the share to the recursive
//! partitioner.

use crate::capacity::CapacityMonitor;
use crate::config::EngineConfig;
use crate::error::{Result, TransferError};
use crate::partition::{PartitionConfig, Partitioner};
use crate::probe::{probe, ShareState};
use crate::publish::publish_permanent;
use crate::retry::{call_with_retry, RetryPolicy};
use crate::stabilize::{wait_for_entries, StabilizeConfig, StabilizeOutcome};
use crate::throttle::ThrottleFlag;
use core_store::{LinkHistoryRepository, PendingStatus, PendingTransferRepository};
use provider_traits::{CloudClient, Notifier, ShareRef};
use std::sync::Arc;
use tracing::{info, warn};

/// How one pipeline run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Fresh links were published
    Published { links: Vec<String> },
    /// The link-history cache already had links; no remote call was made
    CachedHit { links: Vec<String> },
    /// The share is not ready; it was (or stays) parked for the long poller
    Parked { status: PendingStatus },
    /// Receive went through but nothing became visible in time; not a
    /// permanent failure
    NotYetVisible,
}

impl PipelineOutcome {
    /// The links this run produced or recalled, when any.
    pub fn links(&self) -> Option<&[String]> {
        match self {
            PipelineOutcome::Published { links } | PipelineOutcome::CachedHit { links } => {
                Some(links)
            }
            _ => None,
        }
    }
}

pub struct TransferPipeline {
    client: Arc<dyn CloudClient>,
    capacity: Arc<CapacityMonitor>,
    throttle: Arc<ThrottleFlag>,
    history: Arc<dyn LinkHistoryRepository>,
    pending: Arc<dyn PendingTransferRepository>,
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
    stabilize_cfg: StabilizeConfig,
    partition_cfg: PartitionConfig,
    link_base: String,
}

impl TransferPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn CloudClient>,
        capacity: Arc<CapacityMonitor>,
        throttle: Arc<ThrottleFlag>,
        history: Arc<dyn LinkHistoryRepository>,
        pending: Arc<dyn PendingTransferRepository>,
        notifier: Arc<dyn Notifier>,
        cfg: &EngineConfig,
        link_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            capacity,
            throttle,
            history,
            pending,
            notifier,
            policy: RetryPolicy::from_config(cfg),
            stabilize_cfg: StabilizeConfig::from_config(cfg),
            partition_cfg: PartitionConfig::from_config(cfg),
            link_base: link_base.into(),
        }
    }

    /// Run the pipeline for a fresh submission. Non-ready states park the
    /// share as a new pending transfer.
    pub async fn run(
        &self,
        source: &ShareRef,
        metadata: &serde_json::Value,
    ) -> Result<PipelineOutcome> {
        self.run_inner(source, metadata, true).await
    }

    /// Run the pipeline for a share the long poller already owns a pending
    /// record for; parked outcomes are reported without inserting a
    /// duplicate row.
    pub async fn run_parked(
        &self,
        source: &ShareRef,
        metadata: &serde_json::Value,
    ) -> Result<PipelineOutcome> {
        self.run_inner(source, metadata, false).await
    }

    async fn run_inner(
        &self,
        source: &ShareRef,
        metadata: &serde_json::Value,
        park_on_hold: bool,
    ) -> Result<PipelineOutcome> {
        // idempotence cache: a hit skips every remote mutation
        if let Some(record) = self.history.find_by_source(&source.share_code).await? {
            info!(share = %source, "link history hit, skipping transfer");
            return Ok(PipelineOutcome::CachedHit {
                links: record.links,
            });
        }

        if self.throttle.is_active() {
            return self
                .park(source, metadata, PendingStatus::Restricted, park_on_hold)
                .await;
        }

        let state = probe(self.client.as_ref(), &self.policy, source).await?;
        let (entries, total_files, total_bytes) = match state {
            ShareState::Ready {
                entries,
                total_files,
                total_bytes,
            } => (entries, total_files, total_bytes),
            ref s => {
                if let Some(status) = s.parked_status() {
                    return self.park(source, metadata, status, park_on_hold).await;
                }
                // the only remaining states are the permanent rejections
                let state = s.rejection().unwrap_or("rejected");
                return Err(TransferError::PermanentRejection {
                    share_code: source.share_code.clone(),
                    state,
                });
            }
        };

        info!(
            share = %source,
            top_level = entries.len(),
            total_files = total_files.unwrap_or(0),
            "share ready, transferring"
        );

        self.capacity
            .ensure_capacity(entries.len(), total_bytes.unwrap_or(0))
            .await?;

        let dest_id = self.capacity.managed_dir_id().await?;
        let ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        let names: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();

        let mut links: Vec<String> = Vec::new();
        let mut search_dir = dest_id.clone();
        let mut partition_failed_batches: Option<u64> = None;

        match call_with_retry(&self.policy, || {
            self.client.receive(source, &ids, &dest_id)
        })
        .await
        {
            Ok(()) => {}
            Err(TransferError::Provider(e)) if e.is_duplicate_receive() => {
                warn!(share = %source, "duplicate receive signal, verifying destination");
                let verify = wait_for_entries(
                    self.client.as_ref(),
                    &self.policy,
                    &self.stabilize_cfg,
                    &dest_id,
                    &names,
                )
                .await?;

                if verify == StabilizeOutcome::NotYetVisible {
                    // nothing actually landed; retry once into a fresh
                    // sibling folder
                    let retry_path = format!(
                        "{}/{}-retry",
                        self.capacity.managed_path(),
                        source.share_code
                    );
                    let retry_id =
                        call_with_retry(&self.policy, || self.client.create_folder(&retry_path))
                            .await?;
                    call_with_retry(&self.policy, || {
                        self.client.receive(source, &ids, &retry_id)
                    })
                    .await?;
                    search_dir = retry_id;
                }
            }
            Err(TransferError::Provider(e)) if e.is_receive_limit() => {
                info!(share = %source, "flat item count over the per-call ceiling, partitioning");
                let partitioner = Partitioner {
                    client: self.client.as_ref(),
                    capacity: self.capacity.as_ref(),
                    policy: &self.policy,
                    cfg: &self.partition_cfg,
                    link_base: &self.link_base,
                };
                let out = partitioner.run(source, &entries).await?;
                links = out.intermediate_links;
                partition_failed_batches = Some(out.failed_batches);
                // the destination root was recreated at every checkpoint;
                // search whatever the current one is
                search_dir = self.capacity.managed_dir_id().await?;
            }
            Err(TransferError::Provider(e)) if e.is_throttled() => {
                self.throttle.engage();
                return self
                    .park(source, metadata, PendingStatus::Restricted, park_on_hold)
                    .await;
            }
            Err(e) => return Err(e),
        }

        let stabilized = wait_for_entries(
            self.client.as_ref(),
            &self.policy,
            &self.stabilize_cfg,
            &search_dir,
            &names,
        )
        .await?;

        if let StabilizeOutcome::Found(found) = stabilized {
            if !found.is_empty() {
                let found_ids: Vec<String> = found.into_iter().map(|e| e.id).collect();
                let published = publish_permanent(
                    self.client.as_ref(),
                    &self.policy,
                    &found_ids,
                    self.partition_cfg.share_split_ceiling,
                    &self.link_base,
                )
                .await?;
                links.extend(published);
            }
        }

        if links.is_empty() {
            // a partitioned run with nothing published is a real failure;
            // a plain receive that has not surfaced yet is not
            if let Some(failed_batches) = partition_failed_batches {
                return Err(TransferError::PartitionFailed { failed_batches });
            }
            warn!(share = %source, "received items not yet visible, aborting without failure");
            return Ok(PipelineOutcome::NotYetVisible);
        }

        self.history.record(&source.share_code, &links).await?;
        if let Err(e) = self.notifier.link_published(source, &links).await {
            // broadcast failures never fail the transfer
            warn!(share = %source, error = %e, "notifier failed");
        }

        info!(share = %source, links = links.len(), "transfer published");
        Ok(PipelineOutcome::Published { links })
    }

    async fn park(
        &self,
        source: &ShareRef,
        metadata: &serde_json::Value,
        status: PendingStatus,
        insert: bool,
    ) -> Result<PipelineOutcome> {
        if insert {
            self.pending.insert(source, metadata, status).await?;
            info!(share = %source, status = %status, "share parked as pending transfer");
        }
        Ok(PipelineOutcome::Parked { status })
    }
}
