use std::net::IpAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::humanize::ByteSize;

/// Top-level configuration. See SPEC_FULL.md §6.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub build: BuildConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.host, self.port)
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    3000
}

/// Storage provider backing the builds/uploads roots and the queue backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    #[default]
    Local,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    #[serde(default = "default_builds_dir")]
    pub builds_dir: PathBuf,
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
    #[serde(default = "default_queue_path")]
    pub queue_path: PathBuf,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: ByteSize,
    /// This implementation's stand-in for the spec's `REDIS_URL (or
    /// equivalent)`: the embedded queue backend has no network address, so
    /// this is accepted but only consulted when it names a filesystem path
    /// (see `config::sources`).
    pub queue_backend_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::default(),
            builds_dir: default_builds_dir(),
            uploads_dir: default_uploads_dir(),
            queue_path: default_queue_path(),
            max_file_size: default_max_file_size(),
            queue_backend_url: None,
        }
    }
}

fn default_builds_dir() -> PathBuf {
    PathBuf::from("./builds")
}

fn default_uploads_dir() -> PathBuf {
    std::env::temp_dir().join("demo2apk-uploads")
}

fn default_queue_path() -> PathBuf {
    PathBuf::from("data/queue")
}

fn default_max_file_size() -> ByteSize {
    ByteSize(31_457_280)
}

/// Maximum icon upload size. Fixed by the spec, not independently configurable.
pub const MAX_ICON_SIZE_BYTES: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_rate_limit_max")]
    pub max: u32,
    #[serde(default = "default_rate_limit_window_secs")]
    pub window_secs: u64,
    /// Capacity granted to requests carrying a valid bearer token, per the
    /// spec's "authenticated" quota tier (§1 Non-goals: auth is optional and
    /// only unlocks a higher quota, nothing more).
    #[serde(default = "default_rate_limit_authenticated_max")]
    pub authenticated_max: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max: default_rate_limit_max(),
            window_secs: default_rate_limit_window_secs(),
            authenticated_max: default_rate_limit_authenticated_max(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_rate_limit_max() -> u32 {
    5
}

fn default_rate_limit_window_secs() -> u64 {
    3600
}

fn default_rate_limit_authenticated_max() -> u32 {
    20
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_concurrency")]
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_worker_concurrency(),
        }
    }
}

fn default_worker_concurrency() -> usize {
    2
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_file_retention_hours")]
    pub file_retention_hours: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            file_retention_hours: default_file_retention_hours(),
        }
    }
}

fn default_file_retention_hours() -> u64 {
    2
}

/// Fixed job-record retention windows (spec §4.3). Not independently
/// configurable; listed here for discoverability alongside the rest of the
/// retention knobs.
pub const JOB_COMPLETED_TTL_HOURS: i64 = 24;
pub const JOB_FAILED_TTL_DAYS: i64 = 7;
pub const JOB_RETENTION_MAX_ENTRIES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    #[default]
    Prod,
    Dev,
    Test,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub app_env: AppEnv,
    /// Bypasses the pipeline for testing; writes a dummy artifact. Only
    /// permitted when `app_env` is `dev` or `test` (see DESIGN.md Open
    /// Question resolution).
    #[serde(default)]
    pub mock_build: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            app_env: AppEnv::default(),
            mock_build: false,
        }
    }
}
