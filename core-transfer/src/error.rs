use core_store::StoreError;
use provider_traits::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    /// Remote call exceeded its timeout on every attempt
    #[error("remote call timed out after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Share is terminally unavailable (expired or policy takedown)
    #[error("share {share_code} rejected permanently: {state}")]
    PermanentRejection {
        share_code: String,
        state: &'static str,
    },

    /// Snapshot reported a wire state the client could not classify
    #[error("ambiguous share snapshot state {0}")]
    AmbiguousSnapshot(i64),

    /// Share snapshot is ready but lists no transferable items
    #[error("share contains no transferable items")]
    EmptyShare,

    /// A partitioned transfer ended with nothing published
    #[error("partitioned transfer produced no links ({failed_batches} batches failed)")]
    PartitionFailed { failed_batches: u64 },

    /// The single-flight queue's consumer is gone
    #[error("operation queue closed")]
    QueueClosed,

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("invalid job transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// A job in an active state blocked the requested operation
    #[error("job {0} is still active")]
    JobActive(String),
}

pub type Result<T> = std::result::Result<T, TransferError>;
