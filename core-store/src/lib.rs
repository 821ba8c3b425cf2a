//! # Core Store
//!
//! SQLite persistence for the transfer engine.
//!
//! ## Overview
//!
//! Four tables back the engine's durable state:
//!
//! - `pending_transfers` - shares parked while the provider audits,
//!   snapshots or throttles
//! - `transfer_jobs` - batch runs over ordered item lists
//! - `transfer_items` - the rows of a job
//! - `link_history` - source-reference → published-link memoization
//!
//! ## Components
//!
//! - **Pool** (`db`): WAL-mode SQLite pool with schema initialization
//! - **Models** (`models`): entities and status enums
//! - **Repositories** (`repositories`): `async_trait` CRUD seams with
//!   SQLite implementations

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, init_schema, DatabaseConfig};
pub use error::{Result, StoreError};
pub use models::{
    ItemCounts, ItemStatus, JobId, JobStatus, LinkRecord, NewItem, PendingStatus, PendingTransfer,
    TransferItem, TransferJob,
};
pub use repositories::{
    ItemRepository, JobRepository, LinkHistoryRepository, PendingTransferRepository,
    SqliteItemRepository, SqliteJobRepository, SqliteLinkHistoryRepository,
    SqlitePendingTransferRepository,
};
