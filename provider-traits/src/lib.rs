//! # Provider Traits
//!
//! Trait seams between the transfer engine and its external collaborators.
//!
//! ## Overview
//!
//! This crate defines the contract the engine consumes without knowing the
//! concrete provider:
//!
//! - [`CloudClient`](client::CloudClient) - the remote cloud-storage account
//!   (share snapshots, receive, publish, folder and trash management)
//! - [`Notifier`](notify::Notifier) - fan-out of freshly published links to
//!   notification channels
//!
//! Wire-level data shapes live in [`types`] and the shared error taxonomy in
//! [`error`]. Concrete clients map their provider's response codes onto
//! [`ProviderError`](error::ProviderError) variants and the classification
//! predicates; the engine never inspects raw responses.

pub mod client;
pub mod error;
pub mod notify;
pub mod types;

pub use client::CloudClient;
pub use error::{ProviderError, Result, ERRNO_ALREADY_DELETED, ERRNO_DUPLICATE_RECEIVE};
pub use notify::{NullNotifier, Notifier};
pub use types::{
    PublishedShare, RemoteEntry, ShareAvailability, ShareRef, ShareSnapshot, SpaceInfo,
};
