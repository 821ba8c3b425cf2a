//! Workspace facade crate.
//!
//! Re-exports the individual workspace crates so a host application can
//! depend on `share-relay` alone instead of wiring each member crate.

pub use core_runtime as runtime;
pub use core_store as store;
pub use core_transfer as transfer;
pub use provider_traits as provider;
