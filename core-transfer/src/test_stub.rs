//! Scripted [`CloudClient`] stub shared by the unit tests in this crate.

use async_trait::async_trait;
use provider_traits::{
    CloudClient, ProviderError, PublishedShare, RemoteEntry, ShareRef, ShareSnapshot, SpaceInfo,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

pub struct StubClient {
    snapshots: Mutex<VecDeque<provider_traits::Result<ShareSnapshot>>>,
    listings: Mutex<VecDeque<Vec<RemoteEntry>>>,
    share_dirs: Mutex<HashMap<String, Vec<RemoteEntry>>>,
    receive_errors: Mutex<VecDeque<ProviderError>>,
    space: Mutex<SpaceInfo>,
    receive_batches: Mutex<Vec<usize>>,
    created_folders: Mutex<Vec<String>>,
    deleted_folders: Mutex<Vec<String>>,
    published: Mutex<Vec<Vec<String>>>,
    extended: Mutex<Vec<String>>,
    trash_empties: AtomicU32,
    list_folder_count: AtomicU32,
    next_id: AtomicU64,
    receive_delay: Mutex<std::time::Duration>,
}

impl StubClient {
    pub fn new() -> Self {
        Self {
            snapshots: Mutex::new(VecDeque::new()),
            listings: Mutex::new(VecDeque::new()),
            share_dirs: Mutex::new(HashMap::new()),
            receive_errors: Mutex::new(VecDeque::new()),
            space: Mutex::new(SpaceInfo {
                used_bytes: 0,
                total_bytes: 1 << 40,
            }),
            receive_batches: Mutex::new(Vec::new()),
            created_folders: Mutex::new(Vec::new()),
            deleted_folders: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            extended: Mutex::new(Vec::new()),
            trash_empties: AtomicU32::new(0),
            list_folder_count: AtomicU32::new(0),
            next_id: AtomicU64::new(1),
            receive_delay: Mutex::new(std::time::Duration::ZERO),
        }
    }

    pub fn set_receive_delay(&self, delay: std::time::Duration) {
        *self.receive_delay.lock().unwrap() = delay;
    }

    pub fn push_snapshot(&self, snapshot: provider_traits::Result<ShareSnapshot>) {
        self.snapshots.lock().unwrap().push_back(snapshot);
    }

    pub fn push_listing(&self, entries: Vec<RemoteEntry>) {
        self.listings.lock().unwrap().push_back(entries);
    }

    pub fn set_share_dir(&self, dir_id: &str, entries: Vec<RemoteEntry>) {
        self.share_dirs
            .lock()
            .unwrap()
            .insert(dir_id.to_string(), entries);
    }

    pub fn push_receive_error(&self, error: ProviderError) {
        self.receive_errors.lock().unwrap().push_back(error);
    }

    pub fn set_space(&self, used_bytes: u64, total_bytes: u64) {
        *self.space.lock().unwrap() = SpaceInfo {
            used_bytes,
            total_bytes,
        };
    }

    pub fn receive_batches(&self) -> Vec<usize> {
        self.receive_batches.lock().unwrap().clone()
    }

    pub fn created_folders(&self) -> Vec<String> {
        self.created_folders.lock().unwrap().clone()
    }

    pub fn deleted_folders(&self) -> Vec<String> {
        self.deleted_folders.lock().unwrap().clone()
    }

    pub fn published(&self) -> Vec<Vec<String>> {
        self.published.lock().unwrap().clone()
    }

    pub fn extended(&self) -> Vec<String> {
        self.extended.lock().unwrap().clone()
    }

    pub fn trash_empties(&self) -> u32 {
        self.trash_empties.load(Ordering::SeqCst)
    }

    pub fn list_folder_calls(&self) -> u32 {
        self.list_folder_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CloudClient for StubClient {
    async fn snapshot(&self, _share: &ShareRef) -> provider_traits::Result<ShareSnapshot> {
        self.snapshots
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Parse("unscripted snapshot".to_string())))
    }

    async fn list_share_dir(
        &self,
        _share: &ShareRef,
        dir_id: &str,
    ) -> provider_traits::Result<Vec<RemoteEntry>> {
        Ok(self
            .share_dirs
            .lock()
            .unwrap()
            .get(dir_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn receive(
        &self,
        _share: &ShareRef,
        item_ids: &[String],
        _dest_id: &str,
    ) -> provider_traits::Result<()> {
        let delay = *self.receive_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.receive_batches.lock().unwrap().push(item_ids.len());
        if let Some(error) = self.receive_errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(())
    }

    async fn create_folder(&self, path: &str) -> provider_traits::Result<String> {
        self.created_folders.lock().unwrap().push(path.to_string());
        Ok(format!("dir-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn list_folder(&self, _dir_id: &str) -> provider_traits::Result<Vec<RemoteEntry>> {
        self.list_folder_count.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .listings
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn publish(&self, item_ids: &[String]) -> provider_traits::Result<PublishedShare> {
        let mut published = self.published.lock().unwrap();
        published.push(item_ids.to_vec());
        Ok(PublishedShare {
            share_code: format!("pub{}", published.len()),
            access_code: None,
        })
    }

    async fn extend_to_permanent(&self, share_code: &str) -> provider_traits::Result<()> {
        self.extended.lock().unwrap().push(share_code.to_string());
        Ok(())
    }

    async fn delete_folder(&self, dir_id: &str) -> provider_traits::Result<()> {
        self.deleted_folders.lock().unwrap().push(dir_id.to_string());
        Ok(())
    }

    async fn empty_trash(&self, _password: Option<&str>) -> provider_traits::Result<()> {
        self.trash_empties.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn space_info(&self) -> provider_traits::Result<SpaceInfo> {
        Ok(*self.space.lock().unwrap())
    }
}
