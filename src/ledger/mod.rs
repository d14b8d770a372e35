//! Durable job state and rate-limit counters, backed by an embedded Fjall
//! keyspace shared by the API and worker tasks within this process.
//!
//! Partitions:
//! - `jobs`: taskId -> Job (JSON), doubling as the idempotent-admission
//!   record since jobId == taskId.
//! - `waiting_order`: FIFO sequence -> taskId, scanned for queue position.
//! - `rate_limits`: client id -> fixed-window bucket.
//! - `meta`: sequence counter, pruning cursor.

pub mod error;
pub mod partitions;
pub mod pruning;
pub mod store;

pub use error::{LedgerError, Result};
pub use pruning::PruneStats;
pub use store::{FjallStore, RateLimitDecision, StoreStats};
