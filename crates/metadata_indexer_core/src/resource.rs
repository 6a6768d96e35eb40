use std::fmt;

use serde::Serialize;

use crate::config::PipelineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Table,
    Role,
    Bucket,
    Function,
    Trigger,
}

impl ResourceKind {
    /// Declaration order; creation order is a stable topological sort of it.
    pub const ALL: [ResourceKind; 5] = [
        Self::Table,
        Self::Role,
        Self::Bucket,
        Self::Function,
        Self::Trigger,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Role => "role",
            Self::Bucket => "bucket",
            Self::Function => "function",
            Self::Trigger => "trigger",
        }
    }

    pub fn dependencies(self) -> &'static [ResourceKind] {
        match self {
            Self::Function => &[Self::Role],
            Self::Trigger => &[Self::Function, Self::Bucket],
            Self::Table | Self::Role | Self::Bucket => &[],
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceSpec {
    pub name: String,
    pub kind: ResourceKind,
    pub depends_on: &'static [ResourceKind],
}

impl ResourceSpec {
    pub fn for_kind(kind: ResourceKind, config: &PipelineConfig) -> Self {
        let name = match kind {
            ResourceKind::Table => config.table_name.clone(),
            ResourceKind::Role => config.role_name.clone(),
            ResourceKind::Bucket => config.bucket_name.clone(),
            ResourceKind::Function => config.function_name.clone(),
            ResourceKind::Trigger => config.trigger_statement_id(),
        };
        Self {
            name,
            kind,
            depends_on: kind.dependencies(),
        }
    }
}

/// Observed state of a resource. Never cached: every read goes to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningState {
    Absent,
    Creating,
    Active,
    Deleting,
    Failed,
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Absent => "absent",
            Self::Creating => "creating",
            Self::Active => "active",
            Self::Deleting => "deleting",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleHandle {
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableHandle {
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketHandle {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionHandle {
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerHandle {
    pub function_name: String,
    pub bucket_name: String,
    pub statement_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsureOutcome {
    Created,
    Reused,
    Updated,
}

/// Handle returned by an adapter's `ensure`, tagged with how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ensured<H> {
    pub handle: H,
    pub outcome: EnsureOutcome,
}

impl<H> Ensured<H> {
    pub fn created(handle: H) -> Self {
        Self {
            handle,
            outcome: EnsureOutcome::Created,
        }
    }

    pub fn reused(handle: H) -> Self {
        Self {
            handle,
            outcome: EnsureOutcome::Reused,
        }
    }

    pub fn updated(handle: H) -> Self {
        Self {
            handle,
            outcome: EnsureOutcome::Updated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}
