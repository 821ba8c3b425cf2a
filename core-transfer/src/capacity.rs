//! # Capacity Monitor
//!
//! Keeps the account from running out of space mid-transfer. Cleanup means
//! deleting and recreating the managed directory, then emptying the trash
//! so the space is actually reclaimed.
//!
//! Two independent triggers decide a proactive cleanup before a receive:
//! the configured absolute threshold is exceeded, or the incoming payload
//! would not fit in the currently free space. Periodic and manual checks go
//! through [`CapacityMonitor::check_and_cleanup`] with an explicit mode.
//!
//! The cached managed-directory handle is only mutated by operations
//! running inside the single-flight queue.

use crate::error::{Result, TransferError};
use crate::retry::{call_with_retry, RetryPolicy};
use provider_traits::{CloudClient, SpaceInfo};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Which rule a capacity check applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// Operator-requested: always clean
    Manual,
    /// Periodic: always clean once it gets to run (the caller skips the
    /// submission entirely while the queue is busy)
    Scheduled,
    /// Inside a batch job's idle window: clean only when the configured
    /// threshold is exceeded, or, with no threshold configured, when free
    /// space drops under the fallback floor
    Batch,
}

pub struct CapacityMonitor {
    client: Arc<dyn CloudClient>,
    policy: RetryPolicy,
    managed_dir: String,
    threshold: Option<u64>,
    trash_password: Option<String>,
    batch_free_floor: f64,
    dir_handle: Mutex<Option<String>>,
}

impl CapacityMonitor {
    pub fn new(
        client: Arc<dyn CloudClient>,
        policy: RetryPolicy,
        managed_dir: impl Into<String>,
        threshold: Option<u64>,
        trash_password: Option<String>,
        batch_free_floor: f64,
    ) -> Self {
        Self {
            client,
            policy,
            managed_dir: managed_dir.into(),
            threshold,
            trash_password,
            batch_free_floor,
            dir_handle: Mutex::new(None),
        }
    }

    /// Account storage usage.
    pub async fn stats(&self) -> Result<SpaceInfo> {
        call_with_retry(&self.policy, || self.client.space_info()).await
    }

    /// Absolute provider path of the managed directory.
    pub fn managed_path(&self) -> &str {
        &self.managed_dir
    }

    /// Identifier of the managed directory, creating it on first use.
    pub async fn managed_dir_id(&self) -> Result<String> {
        let mut handle = self.dir_handle.lock().await;
        if let Some(id) = handle.as_ref() {
            return Ok(id.clone());
        }

        let id = call_with_retry(&self.policy, || self.client.create_folder(&self.managed_dir))
            .await?;
        info!(path = %self.managed_dir, dir_id = %id, "managed directory resolved");
        *handle = Some(id.clone());
        Ok(id)
    }

    /// Decide and, when warranted, perform a cleanup before receiving
    /// `pending_items` totalling `pending_bytes`. Returns whether a
    /// cleanup ran.
    ///
    /// The two triggers are independent: an exceeded absolute threshold
    /// cleans even when the payload would fit, and an oversized payload
    /// cleans even under an unconfigured threshold.
    pub async fn ensure_capacity(&self, pending_items: usize, pending_bytes: u64) -> Result<bool> {
        let space = self.stats().await?;
        let over_threshold = self
            .threshold
            .map_or(false, |limit| space.used_bytes >= limit);
        let wont_fit = pending_bytes > space.free_bytes();

        if !over_threshold && !wont_fit {
            return Ok(false);
        }

        info!(
            pending_items,
            pending_bytes,
            used = space.used_bytes,
            total = space.total_bytes,
            over_threshold,
            wont_fit,
            "capacity cleanup before receive"
        );
        self.cleanup().await?;
        Ok(true)
    }

    /// Mode-driven check. Returns whether a cleanup ran.
    pub async fn check_and_cleanup(&self, mode: CheckMode) -> Result<bool> {
        let clean = match mode {
            CheckMode::Manual | CheckMode::Scheduled => true,
            CheckMode::Batch => {
                let space = self.stats().await?;
                match self.threshold {
                    Some(limit) => space.used_bytes >= limit,
                    None => {
                        let floor = (space.total_bytes as f64 * self.batch_free_floor) as u64;
                        space.free_bytes() < floor
                    }
                }
            }
        };

        if clean {
            info!(?mode, "capacity check triggered cleanup");
            self.cleanup().await?;
        }
        Ok(clean)
    }

    /// Delete and recreate the managed directory, then empty the trash.
    pub async fn cleanup(&self) -> Result<()> {
        let mut handle = self.dir_handle.lock().await;

        let dir_id = match handle.take() {
            Some(id) => id,
            None => {
                call_with_retry(&self.policy, || self.client.create_folder(&self.managed_dir))
                    .await?
            }
        };

        match call_with_retry(&self.policy, || self.client.delete_folder(&dir_id)).await {
            Ok(()) => {}
            Err(TransferError::Provider(e)) if e.is_already_deleted() => {
                warn!(dir_id = %dir_id, "managed directory already gone on the provider side");
            }
            Err(e) => return Err(e),
        }

        let new_id = call_with_retry(&self.policy, || self.client.create_folder(&self.managed_dir))
            .await?;
        *handle = Some(new_id.clone());
        drop(handle);

        self.empty_trash().await?;
        info!(dir_id = %new_id, "managed directory recreated and trash emptied");
        Ok(())
    }

    /// Empty the provider trash on its own (periodic trash run).
    pub async fn empty_trash(&self) -> Result<()> {
        call_with_retry(&self.policy, || {
            self.client.empty_trash(self.trash_password.as_deref())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_stub::StubClient;

    const GB: u64 = 1024 * 1024 * 1024;

    fn monitor(client: Arc<StubClient>, threshold: Option<u64>) -> CapacityMonitor {
        CapacityMonitor::new(
            client,
            RetryPolicy::default(),
            "/share-saves",
            threshold,
            None,
            0.10,
        )
    }

    #[tokio::test]
    async fn test_managed_dir_id_is_cached() {
        let client = Arc::new(StubClient::new());
        let monitor = monitor(Arc::clone(&client), None);

        let first = monitor.managed_dir_id().await.unwrap();
        let second = monitor.managed_dir_id().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(client.created_folders().len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_recreates_dir_and_empties_trash() {
        let client = Arc::new(StubClient::new());
        let monitor = monitor(Arc::clone(&client), None);

        let before = monitor.managed_dir_id().await.unwrap();
        monitor.cleanup().await.unwrap();
        let after = monitor.managed_dir_id().await.unwrap();

        assert_ne!(before, after);
        assert_eq!(client.deleted_folders(), vec![before]);
        assert_eq!(client.trash_empties(), 1);
    }

    #[tokio::test]
    async fn test_ensure_capacity_skips_when_space_is_fine() {
        let client = Arc::new(StubClient::new());
        client.set_space(100 * GB, 1000 * GB);
        let monitor = monitor(Arc::clone(&client), None);

        let cleaned = monitor.ensure_capacity(10, GB).await.unwrap();
        assert!(!cleaned);
        assert!(client.deleted_folders().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_capacity_wont_fit_triggers_without_threshold() {
        let client = Arc::new(StubClient::new());
        client.set_space(995 * GB, 1000 * GB);
        let monitor = monitor(Arc::clone(&client), None);

        let cleaned = monitor.ensure_capacity(10, 20 * GB).await.unwrap();
        assert!(cleaned);
        assert_eq!(client.trash_empties(), 1);
    }

    #[tokio::test]
    async fn test_ensure_capacity_threshold_triggers_even_when_it_fits() {
        let client = Arc::new(StubClient::new());
        client.set_space(900 * GB, 1000 * GB);
        let monitor = monitor(Arc::clone(&client), Some(800 * GB));

        let cleaned = monitor.ensure_capacity(1, GB).await.unwrap();
        assert!(cleaned);
    }

    #[tokio::test]
    async fn test_manual_mode_always_cleans() {
        let client = Arc::new(StubClient::new());
        client.set_space(0, 1000 * GB);
        let monitor = monitor(Arc::clone(&client), None);

        assert!(monitor.check_and_cleanup(CheckMode::Manual).await.unwrap());
        assert_eq!(client.trash_empties(), 1);
    }

    #[tokio::test]
    async fn test_batch_fallback_fires_under_ten_percent_free() {
        let client = Arc::new(StubClient::new());
        client.set_space(920 * GB, 1000 * GB);
        let monitor = monitor(Arc::clone(&client), None);

        assert!(monitor.check_and_cleanup(CheckMode::Batch).await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_fallback_holds_above_ten_percent_free() {
        let client = Arc::new(StubClient::new());
        client.set_space(850 * GB, 1000 * GB);
        let monitor = monitor(Arc::clone(&client), None);

        assert!(!monitor.check_and_cleanup(CheckMode::Batch).await.unwrap());
        assert!(client.deleted_folders().is_empty());
    }

    #[tokio::test]
    async fn test_batch_uses_threshold_when_configured() {
        let client = Arc::new(StubClient::new());
        client.set_space(850 * GB, 1000 * GB);
        let monitor = monitor(Arc::clone(&client), Some(800 * GB));

        assert!(monitor.check_and_cleanup(CheckMode::Batch).await.unwrap());
    }
}
