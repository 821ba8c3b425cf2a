//! Stateful fake cloud provider for the integration suites.

use async_trait::async_trait;
use provider_traits::{
    CloudClient, ProviderError, PublishedShare, RemoteEntry, ShareAvailability, ShareRef,
    ShareSnapshot, SpaceInfo,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct State {
    shares: HashMap<String, ShareSnapshot>,
    /// folder id -> (path, entries)
    folders: HashMap<String, (String, Vec<RemoteEntry>)>,
    /// path -> folder id, so create_folder stays idempotent
    path_ids: HashMap<String, String>,
    next_id: u64,
    receive_calls: u32,
    publish_calls: u32,
    trash_empties: u32,
    space: Option<SpaceInfo>,
}

/// In-memory provider: shares land in folders on receive, folders are
/// created by path, and every mutating call is gauged so tests can assert
/// that none of them ever overlap.
pub struct FakeCloud {
    state: Mutex<State>,
    mutations_in_flight: AtomicU32,
    max_concurrent_mutations: AtomicU32,
    receive_delay: Duration,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::with_receive_delay(Duration::from_millis(5))
    }

    pub fn with_receive_delay(receive_delay: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            mutations_in_flight: AtomicU32::new(0),
            max_concurrent_mutations: AtomicU32::new(0),
            receive_delay,
        }
    }

    pub fn add_ready_share(&self, share_code: &str, file_names: &[&str]) {
        let entries: Vec<RemoteEntry> = file_names
            .iter()
            .enumerate()
            .map(|(i, name)| RemoteEntry::file(format!("{}-f{}", share_code, i), *name, 1024))
            .collect();
        let snapshot = ShareSnapshot {
            availability: ShareAvailability::Ready,
            total_files: Some(entries.len() as u64),
            total_bytes: Some(1024 * entries.len() as u64),
            entries,
        };
        self.state
            .lock()
            .unwrap()
            .shares
            .insert(share_code.to_string(), snapshot);
    }

    pub fn set_share_availability(&self, share_code: &str, availability: ShareAvailability) {
        let mut state = self.state.lock().unwrap();
        let snapshot = state
            .shares
            .entry(share_code.to_string())
            .or_insert_with(|| ShareSnapshot {
                availability,
                entries: vec![],
                total_files: None,
                total_bytes: None,
            });
        snapshot.availability = availability;
    }

    pub fn receive_calls(&self) -> u32 {
        self.state.lock().unwrap().receive_calls
    }

    pub fn publish_calls(&self) -> u32 {
        self.state.lock().unwrap().publish_calls
    }

    pub fn max_concurrent_mutations(&self) -> u32 {
        self.max_concurrent_mutations.load(Ordering::SeqCst)
    }

    fn begin_mutation(&self) -> MutationGuard<'_> {
        let now = self.mutations_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_mutations.fetch_max(now, Ordering::SeqCst);
        MutationGuard { cloud: self }
    }
}

struct MutationGuard<'a> {
    cloud: &'a FakeCloud,
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        self.cloud.mutations_in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CloudClient for FakeCloud {
    async fn snapshot(&self, share: &ShareRef) -> provider_traits::Result<ShareSnapshot> {
        self.state
            .lock()
            .unwrap()
            .shares
            .get(&share.share_code)
            .cloned()
            .ok_or_else(|| ProviderError::Parse(format!("unknown share {}", share.share_code)))
    }

    async fn list_share_dir(
        &self,
        _share: &ShareRef,
        _dir_id: &str,
    ) -> provider_traits::Result<Vec<RemoteEntry>> {
        Ok(vec![])
    }

    async fn receive(
        &self,
        share: &ShareRef,
        item_ids: &[String],
        dest_id: &str,
    ) -> provider_traits::Result<()> {
        let _guard = self.begin_mutation();
        tokio::time::sleep(self.receive_delay).await;

        let mut state = self.state.lock().unwrap();
        state.receive_calls += 1;

        let landed: Vec<RemoteEntry> = {
            let snapshot = state
                .shares
                .get(&share.share_code)
                .ok_or_else(|| ProviderError::Parse("receive from unknown share".to_string()))?;
            snapshot
                .entries
                .iter()
                .filter(|e| item_ids.contains(&e.id))
                .cloned()
                .collect()
        };

        state.next_id += 1;
        let base = state.next_id * 1000;
        let folder = state
            .folders
            .get_mut(dest_id)
            .ok_or_else(|| ProviderError::Parse("receive into unknown folder".to_string()))?;
        for (i, entry) in landed.into_iter().enumerate() {
            folder.1.push(RemoteEntry {
                id: format!("owned-{}", base + i as u64),
                ..entry
            });
        }
        Ok(())
    }

    async fn create_folder(&self, path: &str) -> provider_traits::Result<String> {
        let _guard = self.begin_mutation();
        let mut state = self.state.lock().unwrap();
        if let Some(id) = state.path_ids.get(path) {
            return Ok(id.clone());
        }
        state.next_id += 1;
        let id = format!("dir-{}", state.next_id);
        state.path_ids.insert(path.to_string(), id.clone());
        state.folders.insert(id.clone(), (path.to_string(), vec![]));
        Ok(id)
    }

    async fn list_folder(&self, dir_id: &str) -> provider_traits::Result<Vec<RemoteEntry>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .folders
            .get(dir_id)
            .map(|(_, entries)| entries.clone())
            .unwrap_or_default())
    }

    async fn publish(&self, item_ids: &[String]) -> provider_traits::Result<PublishedShare> {
        let _guard = self.begin_mutation();
        let mut state = self.state.lock().unwrap();
        if item_ids.is_empty() {
            return Err(ProviderError::Parse("publish with no items".to_string()));
        }
        state.publish_calls += 1;
        Ok(PublishedShare {
            share_code: format!("relay{}", state.publish_calls),
            access_code: None,
        })
    }

    async fn extend_to_permanent(&self, _share_code: &str) -> provider_traits::Result<()> {
        let _guard = self.begin_mutation();
        Ok(())
    }

    async fn delete_folder(&self, dir_id: &str) -> provider_traits::Result<()> {
        let _guard = self.begin_mutation();
        let mut state = self.state.lock().unwrap();
        if let Some((path, _)) = state.folders.remove(dir_id) {
            state.path_ids.remove(&path);
            let children: Vec<String> = state
                .folders
                .iter()
                .filter(|(_, (p, _))| p.starts_with(&format!("{}/", path)))
                .map(|(id, _)| id.clone())
                .collect();
            for child in children {
                if let Some((p, _)) = state.folders.remove(&child) {
                    state.path_ids.remove(&p);
                }
            }
        }
        Ok(())
    }

    async fn empty_trash(&self, _password: Option<&str>) -> provider_traits::Result<()> {
        let _guard = self.begin_mutation();
        self.state.lock().unwrap().trash_empties += 1;
        Ok(())
    }

    async fn space_info(&self) -> provider_traits::Result<SpaceInfo> {
        Ok(self.state.lock().unwrap().space.unwrap_or(SpaceInfo {
            used_bytes: 0,
            total_bytes: 1 << 40,
        }))
    }
}
