//! # Core Configuration Module
//!
//! Process-level configuration for the share relay service.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! [`CoreConfig`] holding everything the service needs at startup: the
//! database location, the managed destination directory on the provider,
//! the link base used when composing published URLs, and capacity/cleanup
//! settings. Validation is fail-fast: `build()` rejects inconsistent
//! configurations with actionable messages.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/data/relay.db")
//!     .managed_dir("/share-saves")
//!     .capacity_threshold_bytes(800 * 1024 * 1024 * 1024)
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.managed_dir, "/share-saves");
//! ```

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Default destination directory owned by the service.
const DEFAULT_MANAGED_DIR: &str = "/share-saves";

/// Default base for composing published share links.
const DEFAULT_SHARE_LINK_BASE: &str = "https://115.com/s";

/// Core configuration for the share relay service.
///
/// Use [`CoreConfig::builder`] to construct instances.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Absolute path of the managed destination directory on the provider
    pub managed_dir: String,

    /// Base URL prefix for composing published share links
    pub share_link_base: String,

    /// Absolute storage threshold that triggers cleanup; `None` leaves only
    /// the won't-fit check and the batch-mode 10% fallback active
    pub capacity_threshold_bytes: Option<u64>,

    /// Password for emptying the provider trash, when the account has one
    pub trash_password: Option<String>,

    /// Interval between scheduled managed-directory cleanups, in seconds
    pub cleanup_dir_interval_secs: u64,

    /// Interval between scheduled trash-emptying runs, in seconds
    pub cleanup_trash_interval_secs: u64,
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if !self.managed_dir.starts_with('/') {
            return Err(Error::Config(format!(
                "Managed directory must be an absolute provider path, got '{}'",
                self.managed_dir
            )));
        }

        if self.managed_dir == "/" {
            return Err(Error::Config(
                "Managed directory cannot be the provider root; cleanup deletes it".to_string(),
            ));
        }

        if self.share_link_base.is_empty() {
            return Err(Error::Config("Share link base cannot be empty".to_string()));
        }

        if let Some(0) = self.capacity_threshold_bytes {
            return Err(Error::Config(
                "Capacity threshold must be greater than zero; omit it to disable".to_string(),
            ));
        }

        if self.cleanup_dir_interval_secs == 0 || self.cleanup_trash_interval_secs == 0 {
            return Err(Error::Config(
                "Cleanup intervals must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    managed_dir: Option<String>,
    share_link_base: Option<String>,
    capacity_threshold_bytes: Option<u64>,
    trash_password: Option<String>,
    cleanup_dir_interval_secs: Option<u64>,
    cleanup_trash_interval_secs: Option<u64>,
}

impl CoreConfigBuilder {
    /// Sets the SQLite database path (required).
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the managed destination directory. Default: `/share-saves`.
    pub fn managed_dir(mut self, path: impl Into<String>) -> Self {
        self.managed_dir = Some(path.into());
        self
    }

    /// Sets the base used when composing published links.
    pub fn share_link_base(mut self, base: impl Into<String>) -> Self {
        self.share_link_base = Some(base.into());
        self
    }

    /// Sets the absolute cleanup threshold in bytes.
    pub fn capacity_threshold_bytes(mut self, bytes: u64) -> Self {
        self.capacity_threshold_bytes = Some(bytes);
        self
    }

    /// Sets the provider trash password.
    pub fn trash_password(mut self, password: impl Into<String>) -> Self {
        self.trash_password = Some(password.into());
        self
    }

    /// Sets the scheduled directory-cleanup interval. Default: 30 minutes.
    pub fn cleanup_dir_interval_secs(mut self, secs: u64) -> Self {
        self.cleanup_dir_interval_secs = Some(secs);
        self
    }

    /// Sets the scheduled trash-emptying interval. Default: 2 hours.
    pub fn cleanup_trash_interval_secs(mut self, secs: u64) -> Self {
        self.cleanup_trash_interval_secs = Some(secs);
        self
    }

    /// Builds and validates the final configuration.
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let config = CoreConfig {
            database_path,
            managed_dir: self
                .managed_dir
                .unwrap_or_else(|| DEFAULT_MANAGED_DIR.to_string()),
            share_link_base: self
                .share_link_base
                .unwrap_or_else(|| DEFAULT_SHARE_LINK_BASE.to_string()),
            capacity_threshold_bytes: self.capacity_threshold_bytes,
            trash_password: self.trash_password,
            cleanup_dir_interval_secs: self.cleanup_dir_interval_secs.unwrap_or(30 * 60),
            cleanup_trash_interval_secs: self.cleanup_trash_interval_secs.unwrap_or(2 * 60 * 60),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_database_path() {
        let result = CoreConfig::builder().build();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Database path is required"));
    }

    #[test]
    fn test_builder_defaults() {
        let config = CoreConfig::builder()
            .database_path("/data/relay.db")
            .build()
            .unwrap();

        assert_eq!(config.managed_dir, DEFAULT_MANAGED_DIR);
        assert_eq!(config.share_link_base, DEFAULT_SHARE_LINK_BASE);
        assert!(config.capacity_threshold_bytes.is_none());
        assert!(config.trash_password.is_none());
        assert_eq!(config.cleanup_dir_interval_secs, 1800);
        assert_eq!(config.cleanup_trash_interval_secs, 7200);
    }

    #[test]
    fn test_managed_dir_must_be_absolute() {
        let result = CoreConfig::builder()
            .database_path("/data/relay.db")
            .managed_dir("saves")
            .build();

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("absolute"));
    }

    #[test]
    fn test_managed_dir_rejects_root() {
        let result = CoreConfig::builder()
            .database_path("/data/relay.db")
            .managed_dir("/")
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let result = CoreConfig::builder()
            .database_path("/data/relay.db")
            .capacity_threshold_bytes(0)
            .build();

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("threshold"));
    }

    #[test]
    fn test_full_configuration() {
        let config = CoreConfig::builder()
            .database_path("/data/relay.db")
            .managed_dir("/inbox")
            .share_link_base("https://example.com/s")
            .capacity_threshold_bytes(1 << 40)
            .trash_password("0000")
            .cleanup_dir_interval_secs(600)
            .cleanup_trash_interval_secs(3600)
            .build()
            .unwrap();

        assert_eq!(config.managed_dir, "/inbox");
        assert_eq!(config.capacity_threshold_bytes, Some(1 << 40));
        assert_eq!(config.trash_password.as_deref(), Some("0000"));
    }
}
