//! # Stabilization Poller
//!
//! Destination listings are eventually consistent: items accepted by a
//! receive call may take a while to show up. The poller repeatedly searches
//! the destination for the expected names and settles on one of three
//! signals, in order of preference:
//!
//! 1. the found set reaches the expected size
//! 2. two consecutive polls return an identical non-empty (name, size) set
//! 3. the last non-empty observation after the attempt budget runs out
//!
//! Nothing found after exhaustion is a non-fatal [`StabilizeOutcome::NotYetVisible`].

use crate::config::EngineConfig;
use crate::error::Result;
use crate::retry::{call_with_retry, RetryPolicy};
use provider_traits::{CloudClient, RemoteEntry};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

/// Poll bounds for one stabilization wait
#[derive(Debug, Clone, Copy)]
pub struct StabilizeConfig {
    pub attempts: u32,
    pub interval: Duration,
}

impl StabilizeConfig {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            attempts: cfg.stabilize_attempts,
            interval: cfg.stabilize_interval,
        }
    }
}

impl Default for StabilizeConfig {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_secs(2),
        }
    }
}

/// Result of a stabilization wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StabilizeOutcome {
    /// Matched destination entries, ready to publish
    Found(Vec<RemoteEntry>),
    /// Nothing matched within the attempt budget
    NotYetVisible,
}

/// Wait for the destination folder to list the expected names.
pub async fn wait_for_entries(
    client: &dyn CloudClient,
    policy: &RetryPolicy,
    cfg: &StabilizeConfig,
    dir_id: &str,
    expected: &[String],
) -> Result<StabilizeOutcome> {
    if expected.is_empty() {
        return Ok(StabilizeOutcome::Found(vec![]));
    }

    let expected_set: HashSet<&str> = expected.iter().map(String::as_str).collect();
    let mut previous_signature: Option<Vec<(String, Option<u64>)>> = None;
    let mut last_non_empty: Option<Vec<RemoteEntry>> = None;

    for attempt in 1..=cfg.attempts {
        let listing = call_with_retry(policy, || client.list_folder(dir_id)).await?;
        let matched: Vec<RemoteEntry> = listing
            .into_iter()
            .filter(|e| expected_set.contains(e.name.as_str()))
            .collect();

        debug!(
            dir_id,
            attempt,
            matched = matched.len(),
            expected = expected.len(),
            "stabilization poll"
        );

        if matched.len() >= expected.len() {
            return Ok(StabilizeOutcome::Found(matched));
        }

        let mut signature: Vec<(String, Option<u64>)> = matched
            .iter()
            .map(|e| (e.name.clone(), e.size))
            .collect();
        signature.sort();

        if !matched.is_empty() {
            if previous_signature.as_ref() == Some(&signature) {
                // two identical consecutive observations: the partial set
                // has stopped growing, take it
                return Ok(StabilizeOutcome::Found(matched));
            }
            last_non_empty = Some(matched);
        }
        previous_signature = Some(signature);

        if attempt < cfg.attempts {
            tokio::time::sleep(cfg.interval).await;
        }
    }

    Ok(match last_non_empty {
        Some(entries) => StabilizeOutcome::Found(entries),
        None => StabilizeOutcome::NotYetVisible,
    })
}
