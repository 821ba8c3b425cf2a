//! Repository traits and their SQLite implementations.

mod history;
mod items;
mod jobs;
mod pending;

pub use history::{LinkHistoryRepository, SqliteLinkHistoryRepository};
pub use items::{ItemRepository, SqliteItemRepository};
pub use jobs::{JobRepository, SqliteJobRepository};
pub use pending::{PendingTransferRepository, SqlitePendingTransferRepository};
