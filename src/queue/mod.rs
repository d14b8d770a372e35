//! Durable-enqueue-then-dispatch: persists tasks via [`crate::ledger`], then
//! hands taskIds to worker slot channels.

pub mod broker;

pub use broker::TaskBroker;
