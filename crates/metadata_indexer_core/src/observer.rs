use std::time::Duration;

use serde::Serialize;

use crate::resource::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitReason {
    RolePropagation,
    PermissionPropagation,
    TableActivation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum Transition {
    Started,
    Created,
    Reused,
    Updated,
    Waiting { reason: WaitReason, wait_ms: u64 },
    Deleted,
    AlreadyAbsent,
    Failed { error: String },
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn wait_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// One state transition of one resource, during provisioning or teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub resource: ResourceKind,
    pub name: String,
    #[serde(flatten)]
    pub transition: Transition,
}

pub trait ProgressObserver {
    fn on_event(&self, event: &ProgressEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_event(&self, _event: &ProgressEvent) {}
}

/// Forwards progress to `tracing`, one structured event per transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_event(&self, event: &ProgressEvent) {
        let resource = event.resource.as_str();
        let name = event.name.as_str();
        match &event.transition {
            Transition::Failed { error } => {
                tracing::error!(resource, name, error = %error, "resource step failed");
            }
            Transition::Waiting { reason, wait_ms } => {
                tracing::info!(resource, name, ?reason, wait_ms, "waiting for propagation");
            }
            transition => {
                tracing::info!(resource, name, ?transition, "resource transition");
            }
        }
    }
}
