//! AWS-oriented adapters and handlers for the metadata indexer.
//!
//! This crate owns runtime integration details: the SDK-backed service ports
//! used by the provisioning CLI, the table-backed metadata store, and the
//! function handler. Domain behavior lives in `metadata_indexer_core`.

pub mod adapters;
pub mod handlers;
pub mod telemetry;
