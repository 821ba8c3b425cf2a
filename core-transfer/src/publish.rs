//! Publish owned items as permanent share links, splitting when the item
//! count exceeds the provider's per-share ceiling.

use crate::error::Result;
use crate::retry::{call_with_retry, RetryPolicy};
use provider_traits::CloudClient;
use tracing::info;

/// Publish `item_ids` as one or more shares, convert each to non-expiring,
/// and return the composed links.
pub async fn publish_permanent(
    client: &dyn CloudClient,
    policy: &RetryPolicy,
    item_ids: &[String],
    split_ceiling: usize,
    link_base: &str,
) -> Result<Vec<String>> {
    let mut links = Vec::new();

    for chunk in item_ids.chunks(split_ceiling.max(1)) {
        let share = call_with_retry(policy, || client.publish(chunk)).await?;
        call_with_retry(policy, || client.extend_to_permanent(&share.share_code)).await?;
        let link = share.url(link_base);
        info!(share_code = %share.share_code, items = chunk.len(), "permanent share created");
        links.push(link);
    }

    Ok(links)
}
