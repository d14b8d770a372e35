pub mod api;
pub mod config;
pub mod domain;
pub mod humanize;
pub mod identifiers;
pub mod ledger;
pub mod observability;
pub mod pipeline;
pub mod queue;
pub mod storage;
pub mod worker;
