//! # Remote State Prober
//!
//! Interprets a share snapshot into the small status vocabulary the
//! pipeline branches on: proceed, park, or fail permanently.

use crate::error::{Result, TransferError};
use crate::retry::{call_with_retry, RetryPolicy};
use core_store::PendingStatus;
use provider_traits::{CloudClient, RemoteEntry, ShareAvailability, ShareRef};
use tracing::debug;

/// Probed state of a share
#[derive(Debug, Clone)]
pub enum ShareState {
    /// Content is transferable; carries the flat top-level entry list
    Ready {
        entries: Vec<RemoteEntry>,
        total_files: Option<u64>,
        total_bytes: Option<u64>,
    },
    /// Provider is still auditing; park and poll later
    Auditing,
    /// Snapshot still generating; park and poll later
    Snapshotting,
    /// Permanent failure: the share expired
    Expired,
    /// Permanent failure: policy takedown
    Prohibited,
}

impl ShareState {
    /// The pending status to park under, when the state is non-terminal.
    pub fn parked_status(&self) -> Option<PendingStatus> {
        match self {
            ShareState::Auditing => Some(PendingStatus::Auditing),
            ShareState::Snapshotting => Some(PendingStatus::Snapshotting),
            _ => None,
        }
    }

    /// Terminal-failure label, when the state is a permanent rejection.
    pub fn rejection(&self) -> Option<&'static str> {
        match self {
            ShareState::Expired => Some("expired"),
            ShareState::Prohibited => Some("prohibited"),
            _ => None,
        }
    }
}

/// Fetch and classify the share's snapshot.
///
/// A `Ready` snapshot with no entries and an unclassifiable wire state both
/// raise, per the contract that ambiguity is never silently interpreted.
pub async fn probe(
    client: &dyn CloudClient,
    policy: &RetryPolicy,
    share: &ShareRef,
) -> Result<ShareState> {
    let snapshot = call_with_retry(policy, || client.snapshot(share)).await?;
    debug!(
        share = %share,
        availability = ?snapshot.availability,
        entries = snapshot.entries.len(),
        "share snapshot fetched"
    );

    match snapshot.availability {
        ShareAvailability::Ready => {
            if snapshot.entries.is_empty() {
                return Err(TransferError::EmptyShare);
            }
            Ok(ShareState::Ready {
                entries: snapshot.entries,
                total_files: snapshot.total_files,
                total_bytes: snapshot.total_bytes,
            })
        }
        ShareAvailability::Auditing => Ok(ShareState::Auditing),
        ShareAvailability::Snapshotting => Ok(ShareState::Snapshotting),
        ShareAvailability::Expired => Ok(ShareState::Expired),
        ShareAvailability::Prohibited => Ok(ShareState::Prohibited),
        ShareAvailability::Unknown(code) => Err(TransferError::AmbiguousSnapshot(code)),
    }
}
