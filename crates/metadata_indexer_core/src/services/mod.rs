//! Narrow, synchronous views of the external services the pipeline touches.
//!
//! Implementations classify every failure into a [`ServiceError`] so the
//! resource adapters can decide what is benign without knowing wire-level
//! error codes.
//!
//! [`ServiceError`]: crate::error::ServiceError

pub mod function;
pub mod identity;
pub mod object_storage;
pub mod table;

pub use function::{FunctionDefinition, FunctionDescription, FunctionService, InvokePermission};
pub use identity::IdentityService;
pub use object_storage::{EventSubscription, ObjectStorageService};
pub use table::{TableDefinition, TableDescription, TableService};

/// The four service ports, borrowed for the lifetime of one orchestrator.
#[derive(Clone, Copy)]
pub struct ServicePorts<'a> {
    pub identity: &'a dyn IdentityService,
    pub tables: &'a dyn TableService,
    pub storage: &'a dyn ObjectStorageService,
    pub functions: &'a dyn FunctionService,
}
