//! # Core Runtime
//!
//! Process-level infrastructure for the share relay service.
//!
//! ## Components
//!
//! - **Configuration** (`config`): builder-pattern [`CoreConfig`] with
//!   fail-fast validation
//! - **Logging** (`logging`): `tracing`/`tracing-subscriber` initialization
//!   with env-filter and selectable output formats

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LoggingConfig};
