//! Configuration management for demo2apk
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use demo2apk::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("API listening on: {}", config.server.bind_addr());
//! ```
//!
//! # Environment Variables
//!
//! Two overlapping schemes are accepted. The spec's flat, ungrouped names
//! (`PORT`, `BUILDS_DIR`, `WORKER_CONCURRENCY`, ...) apply directly. Anything
//! without a flat equivalent uses the structured, double-underscore form:
//! `DEMO2APK__<section>__<key>`.
//!
//! Examples:
//! - `PORT=9000`
//! - `WORKER_CONCURRENCY=4`
//! - `DEMO2APK__RATE_LIMIT__AUTHENTICATED_MAX=50`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/demo2apk.toml`. This
//! can be overridden using the `DEMO2APK_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    AppEnv, BuildConfig, RateLimitConfig, RetentionConfig, ServerConfig, StorageConfig,
    StorageProvider, WorkerConfig, JOB_COMPLETED_TTL_HOURS, JOB_FAILED_TTL_DAYS,
    JOB_RETENTION_MAX_ENTRIES, MAX_ICON_SIZE_BYTES,
};
pub use validation::ValidationError;

use thiserror::Error;

pub type Config = models::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment), then
    /// validate and canonicalize storage paths.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = sources::load()?;
        validation::validate(&mut config)?;
        Ok(config)
    }

    /// Load configuration from a specific path. Useful for tests.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let mut config = sources::load_from_sources(path)?;
        validation::validate(&mut config)?;
        Ok(config)
    }
}
