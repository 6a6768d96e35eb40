//! SDK-backed implementations of the core service ports.
//!
//! Every adapter is synchronous at its seam and bridges into the async SDK
//! through [`blocking::BlockingBridge`]; every failure is classified into a
//! core `ServiceError` by [`classify`].

pub mod aws;
pub mod blocking;
pub mod classify;
pub mod dynamodb;
pub mod iam;
pub mod lambda;
pub mod s3;
