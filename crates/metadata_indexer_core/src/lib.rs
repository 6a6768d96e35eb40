//! Shared metadata-indexer domain primitives.
//!
//! This crate owns the provisioning orchestrator, the resource adapters, the
//! event indexer and the artifact builder. It intentionally excludes AWS SDK
//! and Lambda runtime concerns: every external service is reached through the
//! narrow traits in [`services`], implemented against AWS in
//! `metadata_indexer_lambda` and with in-memory fakes in tests.

pub mod artifact;
pub mod config;
pub mod error;
pub mod event;
pub mod indexer;
pub mod observer;
pub mod orchestrator;
pub mod readiness;
pub mod resource;
pub mod resources;
pub mod services;
