//! Engine tunables.

use std::time::Duration;

/// Timing and limit knobs for the transfer engine.
///
/// Defaults match the behavior observed against the production provider;
/// tests shrink the durations to keep suites fast.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Timeout for one remote call attempt
    pub call_timeout: Duration,

    /// Remote call attempts before surfacing a timeout
    pub call_retry_attempts: u32,

    /// Fixed delay between retry attempts
    pub call_retry_delay: Duration,

    /// Stabilization polls before giving up
    pub stabilize_attempts: u32,

    /// Delay between stabilization polls
    pub stabilize_interval: Duration,

    /// Provider's per-call receive ceiling (flat item count)
    pub receive_ceiling: usize,

    /// Files received before an intermediate checkpoint publish
    pub partition_checkpoint: u64,

    /// Utilization above which a mid-walk checkpoint fires
    pub partition_utilization_ceiling: f64,

    /// Jitter bounds for the pause between partition batches
    pub partition_pause_min: Duration,
    pub partition_pause_max: Duration,

    /// Maximum items per published share before splitting
    pub share_split_ceiling: usize,

    /// How long the global throttle flag stays engaged
    pub throttle_ttl: Duration,

    /// Long-poll interval for parked transfers
    pub pending_poll_interval: Duration,

    /// Long-poll probes per parked transfer before giving up
    pub pending_max_attempts: u32,

    /// Bounded wait for the in-flight item on pause/cancel
    pub settle_timeout: Duration,

    /// Bounded wait for the in-flight item on graceful shutdown
    pub shutdown_settle_timeout: Duration,

    /// Batch-mode fallback: clean when free space drops under this
    /// fraction of total (used when no absolute threshold is configured)
    pub batch_free_floor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(60),
            call_retry_attempts: 3,
            call_retry_delay: Duration::from_secs(5),
            stabilize_attempts: 10,
            stabilize_interval: Duration::from_secs(2),
            receive_ceiling: 500,
            partition_checkpoint: 10_000,
            partition_utilization_ceiling: 0.90,
            partition_pause_min: Duration::from_secs(2),
            partition_pause_max: Duration::from_secs(3),
            share_split_ceiling: 10_000,
            throttle_ttl: Duration::from_secs(60 * 60),
            pending_poll_interval: Duration::from_secs(5 * 60),
            pending_max_attempts: 36,
            settle_timeout: Duration::from_secs(60),
            shutdown_settle_timeout: Duration::from_secs(30),
            batch_free_floor: 0.10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_observed_provider_limits() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.receive_ceiling, 500);
        assert_eq!(cfg.partition_checkpoint, 10_000);
        assert_eq!(cfg.share_split_ceiling, 10_000);
        assert_eq!(cfg.call_retry_attempts, 3);
        assert_eq!(cfg.call_retry_delay, Duration::from_secs(5));
        assert_eq!(cfg.stabilize_attempts, 10);
        assert_eq!(cfg.pending_max_attempts, 36);
        assert_eq!(cfg.throttle_ttl, Duration::from_secs(3600));
        assert!((cfg.batch_free_floor - 0.10).abs() < f64::EPSILON);
    }
}
