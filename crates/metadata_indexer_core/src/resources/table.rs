use std::time::Duration;

use super::{AdapterContext, ManagedResource};
use crate::error::{AdapterError, ServiceErrorKind};
use crate::observer::WaitReason;
use crate::resource::{
    DeleteOutcome, Ensured, ProvisioningState, ResourceKind, ResourceSpec, TableHandle,
};
use crate::services::{TableDefinition, TableService};

/// Lowest provisioned throughput the service accepts.
pub const MIN_CAPACITY_UNITS: i64 = 1;

pub struct TableAdapter<'a> {
    tables: &'a dyn TableService,
    ctx: AdapterContext<'a>,
}

impl<'a> TableAdapter<'a> {
    pub fn new(tables: &'a dyn TableService, ctx: AdapterContext<'a>) -> Self {
        Self { tables, ctx }
    }

    fn name(&self) -> &str {
        &self.ctx.config.table_name
    }

    pub fn definition(&self) -> TableDefinition {
        TableDefinition {
            name: self.name().to_string(),
            partition_key: self.ctx.config.partition_key.clone(),
            read_capacity_units: MIN_CAPACITY_UNITS,
            write_capacity_units: MIN_CAPACITY_UNITS,
        }
    }

    /// Returns a handle only once the table is `Active`. An existing table is
    /// adopted without issuing a second create call.
    pub fn ensure(&self) -> Result<Ensured<TableHandle>, AdapterError> {
        let state = self.describe()?;
        let created = match state {
            ProvisioningState::Active | ProvisioningState::Creating => false,
            ProvisioningState::Deleting | ProvisioningState::Failed => {
                return Err(AdapterError::InvalidState {
                    resource: self.name().to_string(),
                    state,
                })
            }
            ProvisioningState::Absent => match self.tables.create_table(&self.definition()) {
                Ok(()) => true,
                // Lost a race with a concurrent or earlier create.
                Err(error)
                    if error.is(ServiceErrorKind::ResourceInUse)
                        || error.is(ServiceErrorKind::AlreadyExists) =>
                {
                    false
                }
                Err(error) => return Err(AdapterError::from_service("dynamodb:CreateTable", error)),
            },
        };

        let handle = self.wait_until_active()?;
        Ok(if created {
            Ensured::created(handle)
        } else {
            Ensured::reused(handle)
        })
    }

    fn wait_until_active(&self) -> Result<TableHandle, AdapterError> {
        let policy = self.ctx.config.table_poll;
        let mut waited = Duration::ZERO;
        loop {
            let description = match self.tables.describe_table(self.name()) {
                Ok(description) => Some(description),
                // Describe can briefly miss a just-created table.
                Err(error) if error.is_not_found() => None,
                Err(error) => {
                    return Err(AdapterError::from_service("dynamodb:DescribeTable", error))
                }
            };

            match description {
                Some(description) if description.state == ProvisioningState::Active => {
                    return Ok(TableHandle {
                        name: description.name,
                        arn: description.arn,
                    });
                }
                Some(description)
                    if matches!(
                        description.state,
                        ProvisioningState::Deleting | ProvisioningState::Failed
                    ) =>
                {
                    return Err(AdapterError::InvalidState {
                        resource: self.name().to_string(),
                        state: description.state,
                    });
                }
                _ => {}
            }

            if policy.interval.is_zero() || waited >= policy.timeout {
                return Err(AdapterError::ReadinessTimeout {
                    resource: self.name().to_string(),
                    waited,
                });
            }
            self.ctx.wait(
                ResourceKind::Table,
                self.name(),
                WaitReason::TableActivation,
                policy.interval,
            );
            waited += policy.interval;
        }
    }
}

impl ManagedResource for TableAdapter<'_> {
    fn spec(&self) -> ResourceSpec {
        ResourceSpec::for_kind(ResourceKind::Table, self.ctx.config)
    }

    fn describe(&self) -> Result<ProvisioningState, AdapterError> {
        match self.tables.describe_table(self.name()) {
            Ok(description) => Ok(description.state),
            Err(error) if error.is_not_found() => Ok(ProvisioningState::Absent),
            Err(error) => Err(AdapterError::from_service("dynamodb:DescribeTable", error)),
        }
    }

    fn delete(&self) -> Result<DeleteOutcome, AdapterError> {
        match self.tables.delete_table(self.name()) {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            // Raised both for a delete already in flight and for a table that
            // is still creating or updating; only the first is done.
            Err(error) if error.is(ServiceErrorKind::ResourceInUse) => match self.describe()? {
                ProvisioningState::Deleting => Ok(DeleteOutcome::Deleted),
                ProvisioningState::Absent => Ok(DeleteOutcome::AlreadyAbsent),
                state => Err(AdapterError::InvalidState {
                    resource: self.name().to_string(),
                    state,
                }),
            },
            Err(error) if error.is_not_found() => Ok(DeleteOutcome::AlreadyAbsent),
            Err(error) => Err(AdapterError::from_service("dynamodb:DeleteTable", error)),
        }
    }
}
