//! Notification broadcaster contract.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ShareRef;

/// Receives `(source, links)` pairs once a transfer completes, for fan-out
/// to whatever channels are configured (chat bots, webhooks, ...).
///
/// Broadcast failures must not fail the transfer; the engine logs them and
/// moves on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn link_published(&self, source: &ShareRef, links: &[String]) -> Result<()>;
}

/// Notifier that drops everything. Default when no channels are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn link_published(&self, _source: &ShareRef, _links: &[String]) -> Result<()> {
        Ok(())
    }
}
