use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::resource::{ProvisioningState, ResourceKind};

/// Normalized classification of a failed service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceErrorKind {
    AlreadyExists,
    NotFound,
    ResourceInUse,
    TransientUnavailable,
    PermissionDenied,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub code: String,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is(&self, kind: ServiceErrorKind) -> bool {
        self.kind == kind
    }

    pub fn is_not_found(&self) -> bool {
        self.is(ServiceErrorKind::NotFound)
    }
}

/// Failure surfaced by a resource adapter. Benign service outcomes
/// (already exists, not found on delete) never reach this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("{operation} still unavailable after the propagation window: {source}")]
    TransientUnavailable {
        operation: &'static str,
        source: ServiceError,
    },
    #[error("{operation} denied: {source}")]
    PermissionDenied {
        operation: &'static str,
        source: ServiceError,
    },
    #[error("{operation} failed: {source}")]
    Unknown {
        operation: &'static str,
        source: ServiceError,
    },
    #[error("{resource} did not become active within {waited:?}")]
    ReadinessTimeout { resource: String, waited: Duration },
    #[error("{resource} is {state}, which does not allow this operation")]
    InvalidState {
        resource: String,
        state: ProvisioningState,
    },
}

impl AdapterError {
    pub fn from_service(operation: &'static str, source: ServiceError) -> Self {
        match source.kind {
            ServiceErrorKind::TransientUnavailable => Self::TransientUnavailable { operation, source },
            ServiceErrorKind::PermissionDenied => Self::PermissionDenied { operation, source },
            ServiceErrorKind::AlreadyExists
            | ServiceErrorKind::NotFound
            | ServiceErrorKind::ResourceInUse
            | ServiceErrorKind::Unknown => Self::Unknown { operation, source },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    #[error("provisioning {resource} failed: {source}")]
    Resource {
        resource: ResourceKind,
        source: AdapterError,
    },
    #[error("{resource} requires {dependency}, which has not been provisioned")]
    MissingDependency {
        resource: ResourceKind,
        dependency: ResourceKind,
    },
    #[error("resource dependency graph has a cycle through {0:?}")]
    DependencyCycle(Vec<ResourceKind>),
}

impl ProvisionError {
    pub fn resource(&self) -> Option<ResourceKind> {
        match self {
            Self::Resource { resource, .. } | Self::MissingDependency { resource, .. } => {
                Some(*resource)
            }
            Self::DependencyCycle(_) => None,
        }
    }
}
