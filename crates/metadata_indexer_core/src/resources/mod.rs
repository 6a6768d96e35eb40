//! Resource adapters: create-or-reuse, describe and delete for each resource
//! of the pipeline, built on the service ports.

pub mod bucket;
pub mod function;
pub mod role;
pub mod table;
pub mod trigger;

use std::time::Duration;

pub use bucket::BucketAdapter;
pub use function::FunctionAdapter;
pub use role::RoleAdapter;
pub use table::TableAdapter;
pub use trigger::TriggerAdapter;

use crate::config::PipelineConfig;
use crate::error::AdapterError;
use crate::observer::{wait_millis, ProgressEvent, ProgressObserver, Transition, WaitReason};
use crate::readiness::Sleeper;
use crate::resource::{DeleteOutcome, ProvisioningState, ResourceKind, ResourceSpec};

/// Uniform teardown and inspection surface shared by every adapter.
pub trait ManagedResource {
    fn spec(&self) -> ResourceSpec;
    fn describe(&self) -> Result<ProvisioningState, AdapterError>;
    fn delete(&self) -> Result<DeleteOutcome, AdapterError>;
}

/// What every adapter borrows from the orchestrator: the configuration, the
/// blocking sleeper and the progress observer.
#[derive(Clone, Copy)]
pub struct AdapterContext<'a> {
    pub config: &'a PipelineConfig,
    pub sleeper: &'a dyn Sleeper,
    pub observer: &'a dyn ProgressObserver,
}

impl<'a> AdapterContext<'a> {
    pub fn emit(&self, resource: ResourceKind, name: &str, transition: Transition) {
        self.observer.on_event(&ProgressEvent {
            resource,
            name: name.to_string(),
            transition,
        });
    }

    /// Reports and performs one blocking wait. Zero durations are skipped.
    pub fn wait(&self, resource: ResourceKind, name: &str, reason: WaitReason, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        self.emit(
            resource,
            name,
            Transition::Waiting {
                reason,
                wait_ms: wait_millis(duration),
            },
        );
        self.sleeper.sleep(duration);
    }
}
