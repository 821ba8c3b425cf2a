//! # Persistent Entities
//!
//! Models for the four engine tables, with status vocabularies that
//! round-trip through their database string representations.

use crate::error::{Result, StoreError};
use provider_traits::ShareRef;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a transfer job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    /// Create a new random job ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a job ID from its string form
    pub fn from_string(s: &str) -> Result<Self> {
        Ok(Self(
            Uuid::parse_str(s).map_err(|e| StoreError::InvalidId(e.to_string()))?,
        ))
    }

    /// String representation for database storage
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status Types
// ============================================================================

/// Why a transfer is parked rather than running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
    /// Provider is auditing the shared content
    Auditing,
    /// Provider is still generating the share snapshot
    Snapshotting,
    /// Parked because the global throttle flag is set
    Restricted,
}

impl PendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingStatus::Auditing => "auditing",
            PendingStatus::Snapshotting => "snapshotting",
            PendingStatus::Restricted => "restricted",
        }
    }
}

impl FromStr for PendingStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auditing" => Ok(PendingStatus::Auditing),
            "snapshotting" => Ok(PendingStatus::Snapshotting),
            "restricted" => Ok(PendingStatus::Restricted),
            _ => Err(StoreError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for PendingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a transfer job.
///
/// ```text
/// Wait → Queued → Running → Completed
///                    ↓↑
///            Pausing → Paused (resumable)
///                    ↓
///         Cancelling → Cancelled
/// ```
///
/// `Pausing` and `Cancelling` are deliberate two-phase transitions: the
/// driver stops pulling new items first, then commits the settled state
/// once the in-flight item finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, never started
    Wait,
    /// Start requested while another job holds the running slot
    Queued,
    /// Owns the running slot
    Running,
    /// Pause requested, in-flight item still settling
    Pausing,
    /// Paused; can be resumed
    Paused,
    /// Cancel requested, in-flight item still settling
    Cancelling,
    /// Cancelled; terminal
    Cancelled,
    /// All items settled; terminal
    Completed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Wait => "wait",
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Pausing => "pausing",
            JobStatus::Paused => "paused",
            JobStatus::Cancelling => "cancelling",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Completed => "completed",
        }
    }

    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Cancelled | JobStatus::Completed)
    }

    /// Transitional states settle once the in-flight item finishes
    pub fn is_transitional(&self) -> bool {
        matches!(self, JobStatus::Pausing | JobStatus::Cancelling)
    }

    /// States a `start` request may act on
    pub fn is_startable(&self) -> bool {
        matches!(self, JobStatus::Wait | JobStatus::Paused)
    }

    /// Validate a state transition
    pub fn can_transition(&self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Wait, Queued)
                | (Wait, Running)
                | (Wait, Cancelled)
                | (Queued, Running)
                | (Queued, Paused)
                | (Queued, Cancelled)
                | (Running, Pausing)
                | (Running, Cancelling)
                | (Running, Completed)
                | (Running, Paused)
                | (Pausing, Paused)
                | (Pausing, Cancelling)
                | (Cancelling, Cancelled)
                | (Paused, Queued)
                | (Paused, Running)
                | (Paused, Cancelled)
        )
    }
}

impl FromStr for JobStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "wait" => Ok(JobStatus::Wait),
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "pausing" => Ok(JobStatus::Pausing),
            "paused" => Ok(JobStatus::Paused),
            "cancelling" => Ok(JobStatus::Cancelling),
            "cancelled" => Ok(JobStatus::Cancelled),
            "completed" => Ok(JobStatus::Completed),
            _ => Err(StoreError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of one job row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Skipped,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Success => "success",
            ItemStatus::Failed => "failed",
            ItemStatus::Skipped => "skipped",
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            ItemStatus::Success | ItemStatus::Failed | ItemStatus::Skipped
        )
    }
}

impl FromStr for ItemStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "processing" => Ok(ItemStatus::Processing),
            "success" => Ok(ItemStatus::Success),
            "failed" => Ok(ItemStatus::Failed),
            "skipped" => Ok(ItemStatus::Skipped),
            _ => Err(StoreError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A share parked because the remote is auditing, snapshotting or throttling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransfer {
    pub id: i64,
    pub source: ShareRef,
    /// Opaque caller metadata carried through to the notifier
    pub metadata: serde_json::Value,
    pub status: PendingStatus,
    /// Long-poll probes performed so far
    pub attempts: u32,
    /// Unix timestamp of the last probe
    pub last_check: i64,
    pub created_at: i64,
}

/// One batch run over an ordered list of transfer items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferJob {
    pub id: JobId,
    pub name: String,
    pub status: JobStatus,
    pub total_count: u32,
    pub success_count: u32,
    pub fail_count: u32,
    /// Inter-item jitter bounds, seconds
    pub min_delay_secs: u32,
    pub max_delay_secs: u32,
    /// Leading items marked skipped on a fresh start
    pub skip_count: u32,
    /// Position of the item most recently handed to the pipeline
    pub position: u32,
    /// True while the driver sleeps between items
    pub waiting: bool,
    pub created_at: i64,
}

impl TransferJob {
    /// Create a new job in `Wait` state
    pub fn new(name: impl Into<String>, total_count: u32) -> Self {
        Self {
            id: JobId::new(),
            name: name.into(),
            status: JobStatus::Wait,
            total_count,
            success_count: 0,
            fail_count: 0,
            min_delay_secs: 5,
            max_delay_secs: 15,
            skip_count: 0,
            position: 0,
            waiting: false,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// One row of a transfer job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItem {
    pub id: i64,
    pub job_id: JobId,
    /// 1-based ordinal within the job
    pub position: u32,
    pub source: ShareRef,
    pub title: Option<String>,
    pub status: ItemStatus,
    /// Published links; a partitioned source legally fans out into several
    pub links: Vec<String>,
    pub error_message: Option<String>,
}

/// Input row for bulk item creation; positions are assigned by order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub source: ShareRef,
    pub title: Option<String>,
}

/// Memoized source-reference → published link(s)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: i64,
    pub share_code: String,
    pub links: Vec<String>,
    pub created_at: i64,
}

/// Item-status histogram for one job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemCounts {
    pub pending: u32,
    pub processing: u32,
    pub success: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl ItemCounts {
    pub fn total(&self) -> u32 {
        self.pending + self.processing + self.success + self.failed + self.skipped
    }

    pub fn settled(&self) -> u32 {
        self.success + self.failed + self.skipped
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_roundtrip() {
        let id = JobId::new();
        let parsed = JobId::from_string(&id.as_str()).unwrap();
        assert_eq!(id, parsed);
        assert!(JobId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_pending_status_roundtrip() {
        for status in [
            PendingStatus::Auditing,
            PendingStatus::Snapshotting,
            PendingStatus::Restricted,
        ] {
            assert_eq!(status.as_str().parse::<PendingStatus>().unwrap(), status);
        }
        assert!("frozen".parse::<PendingStatus>().is_err());
    }

    #[test]
    fn test_job_status_roundtrip() {
        for status in [
            JobStatus::Wait,
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Pausing,
            JobStatus::Paused,
            JobStatus::Cancelling,
            JobStatus::Cancelled,
            JobStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_job_status_predicates() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Paused.is_terminal());

        assert!(JobStatus::Pausing.is_transitional());
        assert!(JobStatus::Cancelling.is_transitional());
        assert!(!JobStatus::Running.is_transitional());

        assert!(JobStatus::Wait.is_startable());
        assert!(JobStatus::Paused.is_startable());
        assert!(!JobStatus::Running.is_startable());
    }

    #[test]
    fn test_job_status_transitions() {
        assert!(JobStatus::Wait.can_transition(JobStatus::Running));
        assert!(JobStatus::Wait.can_transition(JobStatus::Queued));
        assert!(JobStatus::Running.can_transition(JobStatus::Pausing));
        assert!(JobStatus::Pausing.can_transition(JobStatus::Paused));
        assert!(JobStatus::Paused.can_transition(JobStatus::Running));
        assert!(JobStatus::Cancelling.can_transition(JobStatus::Cancelled));

        // pausing collapses straight to paused, never back to running
        assert!(!JobStatus::Pausing.can_transition(JobStatus::Running));
        // terminal states are final
        assert!(!JobStatus::Completed.can_transition(JobStatus::Running));
        assert!(!JobStatus::Cancelled.can_transition(JobStatus::Queued));
    }

    #[test]
    fn test_item_status_roundtrip() {
        for status in [
            ItemStatus::Pending,
            ItemStatus::Processing,
            ItemStatus::Success,
            ItemStatus::Failed,
            ItemStatus::Skipped,
        ] {
            assert_eq!(status.as_str().parse::<ItemStatus>().unwrap(), status);
        }
        assert!(ItemStatus::Success.is_settled());
        assert!(ItemStatus::Skipped.is_settled());
        assert!(!ItemStatus::Processing.is_settled());
    }

    #[test]
    fn test_new_job_defaults() {
        let job = TransferJob::new("march batch", 42);
        assert_eq!(job.status, JobStatus::Wait);
        assert_eq!(job.total_count, 42);
        assert_eq!(job.success_count, 0);
        assert_eq!(job.fail_count, 0);
        assert!(!job.waiting);
    }

    #[test]
    fn test_item_counts_partition() {
        let counts = ItemCounts {
            pending: 3,
            processing: 1,
            success: 4,
            failed: 1,
            skipped: 2,
        };
        assert_eq!(counts.total(), 11);
        assert_eq!(counts.settled(), 7);
    }
}
