//! Remote cloud-storage client contract.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{PublishedShare, RemoteEntry, ShareRef, ShareSnapshot, SpaceInfo};

/// The remote cloud-storage account the engine operates against.
///
/// Implementations wrap the provider's HTTP API (including authentication,
/// serialization and per-call transport concerns). The engine guarantees
/// that at most one *mutating* method (`receive`, `create_folder`,
/// `publish`, `extend_to_permanent`, `delete_folder`, `empty_trash`) is in
/// flight at any time; read-only methods may be called concurrently with
/// them.
///
/// # Example
///
/// ```ignore
/// use provider_traits::{CloudClient, ShareRef};
///
/// async fn transferable(client: &dyn CloudClient, share: &ShareRef) -> bool {
///     match client.snapshot(share).await {
///         Ok(snap) => !snap.entries.is_empty(),
///         Err(_) => false,
///     }
/// }
/// ```
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// Fetch the share's snapshot: availability plus top-level entries.
    async fn snapshot(&self, share: &ShareRef) -> Result<ShareSnapshot>;

    /// List the children of a folder *inside* a share (tree walk support).
    async fn list_share_dir(&self, share: &ShareRef, dir_id: &str) -> Result<Vec<RemoteEntry>>;

    /// Receive the given share items into the destination folder.
    async fn receive(&self, share: &ShareRef, item_ids: &[String], dest_id: &str) -> Result<()>;

    /// Create a folder (and any missing ancestors) at the given absolute
    /// path in the account, returning its identifier. Idempotent.
    async fn create_folder(&self, path: &str) -> Result<String>;

    /// List the direct children of an owned folder.
    async fn list_folder(&self, dir_id: &str) -> Result<Vec<RemoteEntry>>;

    /// Create a share over the given owned items.
    async fn publish(&self, item_ids: &[String]) -> Result<PublishedShare>;

    /// Convert a share into a non-expiring one.
    async fn extend_to_permanent(&self, share_code: &str) -> Result<()>;

    /// Delete an owned folder and everything under it.
    async fn delete_folder(&self, dir_id: &str) -> Result<()>;

    /// Empty the account trash, supplying the trash password when set.
    async fn empty_trash(&self, password: Option<&str>) -> Result<()>;

    /// Account storage usage.
    async fn space_info(&self) -> Result<SpaceInfo>;
}
