//! # Transfer Task Engine
//!
//! Turns an unreliable, rate-limited, eventually-consistent cloud-storage
//! API into a dependable queued service: receive shared content into an
//! account-owned directory and republish it as durable links.
//!
//! ## Components
//!
//! - **Resilient Call Wrapper** (`retry`): bounded timeout + retry around
//!   any single remote call
//! - **Remote State Prober** (`probe`): snapshot classification into
//!   ready / parked / permanently-rejected
//! - **Stabilization Poller** (`stabilize`): waits for received items to
//!   become visible and size-stable at the destination
//! - **Capacity Monitor** (`capacity`): storage stats, proactive cleanup,
//!   Manual/Scheduled/Batch check modes
//! - **Single-Flight Queue** (`queue`): the serialization point; at most
//!   one mutating remote call is ever in flight
//! - **Recursive Partitioner** (`partition`): bounded-batch tree transfer
//!   with checkpointed intermediate publishing
//! - **Transfer Pipeline** (`pipeline`): the end-to-end queued operation
//! - **Pending Long Poller** (`pending`): parked shares re-probed on a
//!   five-minute horizon
//! - **Batch Job Controller** (`controller`): persisted, crash-recoverable
//!   job state machine with a jittered driver loop
//! - **Engine Facade** (`engine`): wires everything and fronts the API
//!   layer

pub mod capacity;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod partition;
pub mod pending;
pub mod pipeline;
pub mod probe;
pub mod publish;
pub mod queue;
pub mod retry;
pub mod stabilize;
pub mod throttle;

#[cfg(test)]
pub(crate) mod test_stub;

pub use capacity::{CapacityMonitor, CheckMode};
pub use config::EngineConfig;
pub use controller::{JobController, JobReport};
pub use engine::TransferEngine;
pub use error::{Result, TransferError};
pub use partition::{PartitionConfig, PartitionOutcome, Partitioner};
pub use pending::PendingPoller;
pub use pipeline::{PipelineOutcome, TransferPipeline};
pub use probe::{probe, ShareState};
pub use publish::publish_permanent;
pub use queue::SingleFlightQueue;
pub use retry::{call_with_retry, RetryPolicy};
pub use stabilize::{wait_for_entries, StabilizeConfig, StabilizeOutcome};
pub use throttle::ThrottleFlag;
