//! Create-or-reuse provisioning and reverse-order teardown of the pipeline.
//!
//! Provisioning is sequential and fail-fast: the first fatal adapter error
//! stops the run, and because every adapter is idempotent a later run picks
//! up where the failed one stopped. Teardown walks the exact reverse of the
//! creation order, attempts every resource regardless of earlier failures and
//! reports a per-resource summary.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::PipelineConfig;
use crate::error::{AdapterError, ProvisionError};
use crate::observer::{ProgressObserver, Transition};
use crate::readiness::Sleeper;
use crate::resource::{
    BucketHandle, DeleteOutcome, EnsureOutcome, Ensured, FunctionHandle, ProvisioningState,
    ResourceKind, ResourceSpec, RoleHandle, TableHandle, TriggerHandle,
};
use crate::resources::{
    AdapterContext, BucketAdapter, FunctionAdapter, ManagedResource, RoleAdapter, TableAdapter,
    TriggerAdapter,
};
use crate::services::ServicePorts;

/// Handles of a fully provisioned pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedPipeline {
    pub table: TableHandle,
    pub role: RoleHandle,
    pub bucket: BucketHandle,
    pub function: FunctionHandle,
    pub trigger: TriggerHandle,
}

#[derive(Debug, Default)]
struct PartialPipeline {
    table: Option<TableHandle>,
    role: Option<RoleHandle>,
    bucket: Option<BucketHandle>,
    function: Option<FunctionHandle>,
    trigger: Option<TriggerHandle>,
}

impl PartialPipeline {
    fn complete(self) -> Result<ProvisionedPipeline, ProvisionError> {
        let missing = |dependency| ProvisionError::MissingDependency {
            resource: ResourceKind::Trigger,
            dependency,
        };
        Ok(ProvisionedPipeline {
            table: self.table.ok_or_else(|| missing(ResourceKind::Table))?,
            role: self.role.ok_or_else(|| missing(ResourceKind::Role))?,
            bucket: self.bucket.ok_or_else(|| missing(ResourceKind::Bucket))?,
            function: self.function.ok_or_else(|| missing(ResourceKind::Function))?,
            trigger: self.trigger.ok_or_else(|| missing(ResourceKind::Trigger))?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownSummary {
    pub succeeded: BTreeSet<String>,
    pub failed: BTreeMap<String, AdapterError>,
}

impl TeardownSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStatus {
    pub spec: ResourceSpec,
    pub state: Result<ProvisioningState, AdapterError>,
}

/// Stable topological sort of the fixed resource graph, seeded with
/// [`ResourceKind::ALL`] so independent resources keep their declared order.
pub fn creation_order() -> Result<Vec<ResourceKind>, ProvisionError> {
    let mut ordered: Vec<ResourceKind> = Vec::with_capacity(ResourceKind::ALL.len());
    let mut pending: Vec<ResourceKind> = ResourceKind::ALL.to_vec();

    while !pending.is_empty() {
        let ready = pending.iter().position(|kind| {
            kind.dependencies()
                .iter()
                .all(|dependency| ordered.contains(dependency))
        });
        match ready {
            Some(index) => ordered.push(pending.remove(index)),
            None => return Err(ProvisionError::DependencyCycle(pending)),
        }
    }

    Ok(ordered)
}

pub fn teardown_order() -> Result<Vec<ResourceKind>, ProvisionError> {
    let mut order = creation_order()?;
    order.reverse();
    Ok(order)
}

pub struct Orchestrator<'a> {
    services: ServicePorts<'a>,
    ctx: AdapterContext<'a>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        services: ServicePorts<'a>,
        sleeper: &'a dyn Sleeper,
        observer: &'a dyn ProgressObserver,
    ) -> Self {
        Self {
            services,
            ctx: AdapterContext {
                config,
                sleeper,
                observer,
            },
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        self.ctx.config
    }

    fn role(&self) -> RoleAdapter<'a> {
        RoleAdapter::new(self.services.identity, self.ctx)
    }

    fn table(&self) -> TableAdapter<'a> {
        TableAdapter::new(self.services.tables, self.ctx)
    }

    fn bucket(&self) -> BucketAdapter<'a> {
        BucketAdapter::new(self.services.storage, self.ctx)
    }

    fn function(&self) -> FunctionAdapter<'a> {
        FunctionAdapter::new(self.services.functions, self.ctx)
    }

    fn trigger(&self) -> TriggerAdapter<'a> {
        TriggerAdapter::new(self.services.functions, self.services.storage, self.ctx)
    }

    fn managed(&self, kind: ResourceKind) -> Box<dyn ManagedResource + 'a> {
        match kind {
            ResourceKind::Table => Box::new(self.table()),
            ResourceKind::Role => Box::new(self.role()),
            ResourceKind::Bucket => Box::new(self.bucket()),
            ResourceKind::Function => Box::new(self.function()),
            ResourceKind::Trigger => Box::new(self.trigger()),
        }
    }

    /// Creates or reuses every resource in dependency order and deploys
    /// `code_payload` to the function.
    pub fn provision(&self, code_payload: &[u8]) -> Result<ProvisionedPipeline, ProvisionError> {
        let mut pipeline = PartialPipeline::default();

        for kind in creation_order()? {
            let spec = ResourceSpec::for_kind(kind, self.ctx.config);
            self.ctx.emit(kind, &spec.name, Transition::Started);

            match kind {
                ResourceKind::Table => {
                    let ensured = self.step(&spec, self.table().ensure())?;
                    pipeline.table = Some(ensured);
                }
                ResourceKind::Role => {
                    let ensured = self.step(&spec, self.role().ensure())?;
                    pipeline.role = Some(ensured);
                }
                ResourceKind::Bucket => {
                    let ensured = self.step(&spec, self.bucket().ensure())?;
                    pipeline.bucket = Some(ensured);
                }
                ResourceKind::Function => {
                    let role = require(kind, ResourceKind::Role, pipeline.role.as_ref())?;
                    let ensured = self.step(&spec, self.function().ensure(role, code_payload))?;
                    pipeline.function = Some(ensured);
                }
                ResourceKind::Trigger => {
                    let function =
                        require(kind, ResourceKind::Function, pipeline.function.as_ref())?;
                    let bucket = require(kind, ResourceKind::Bucket, pipeline.bucket.as_ref())?;
                    let ensured = self.step(&spec, self.trigger().ensure(function, bucket))?;
                    pipeline.trigger = Some(ensured);
                }
            }
        }

        tracing::info!(project = %self.ctx.config.project, "pipeline provisioned");
        pipeline.complete()
    }

    fn step<H>(
        &self,
        spec: &ResourceSpec,
        result: Result<Ensured<H>, AdapterError>,
    ) -> Result<H, ProvisionError> {
        match result {
            Ok(ensured) => {
                let transition = match ensured.outcome {
                    EnsureOutcome::Created => Transition::Created,
                    EnsureOutcome::Reused => Transition::Reused,
                    EnsureOutcome::Updated => Transition::Updated,
                };
                self.ctx.emit(spec.kind, &spec.name, transition);
                Ok(ensured.handle)
            }
            Err(source) => {
                self.ctx.emit(
                    spec.kind,
                    &spec.name,
                    Transition::Failed {
                        error: source.to_string(),
                    },
                );
                Err(ProvisionError::Resource {
                    resource: spec.kind,
                    source,
                })
            }
        }
    }

    /// Deletes every resource in reverse creation order. Never stops early;
    /// re-running retries exactly the resources listed as failed.
    pub fn teardown(&self) -> Result<TeardownSummary, ProvisionError> {
        let mut summary = TeardownSummary::default();

        for kind in teardown_order()? {
            let resource = self.managed(kind);
            let spec = resource.spec();
            self.ctx.emit(kind, &spec.name, Transition::Started);

            match resource.delete() {
                Ok(outcome) => {
                    let transition = match outcome {
                        DeleteOutcome::Deleted => Transition::Deleted,
                        DeleteOutcome::AlreadyAbsent => Transition::AlreadyAbsent,
                    };
                    self.ctx.emit(kind, &spec.name, transition);
                    summary.succeeded.insert(spec.name);
                }
                Err(error) => {
                    self.ctx.emit(
                        kind,
                        &spec.name,
                        Transition::Failed {
                            error: error.to_string(),
                        },
                    );
                    summary.failed.insert(spec.name, error);
                }
            }
        }

        Ok(summary)
    }

    /// Observed state of every resource, in creation order.
    pub fn status(&self) -> Result<Vec<ResourceStatus>, ProvisionError> {
        Ok(creation_order()?
            .into_iter()
            .map(|kind| {
                let resource = self.managed(kind);
                ResourceStatus {
                    spec: resource.spec(),
                    state: resource.describe(),
                }
            })
            .collect())
    }
}

fn require<H>(
    resource: ResourceKind,
    dependency: ResourceKind,
    handle: Option<&H>,
) -> Result<&H, ProvisionError> {
    handle.ok_or(ProvisionError::MissingDependency {
        resource,
        dependency,
    })
}
