use std::collections::BTreeMap;

use super::{AdapterContext, ManagedResource};
use crate::config::TABLE_NAME_ENV;
use crate::error::{AdapterError, ServiceErrorKind};
use crate::observer::WaitReason;
use crate::readiness::retry_while_transient;
use crate::resource::{
    DeleteOutcome, Ensured, FunctionHandle, ProvisioningState, ResourceKind, ResourceSpec,
    RoleHandle,
};
use crate::services::{FunctionDefinition, FunctionService};

pub struct FunctionAdapter<'a> {
    functions: &'a dyn FunctionService,
    ctx: AdapterContext<'a>,
}

impl<'a> FunctionAdapter<'a> {
    pub fn new(functions: &'a dyn FunctionService, ctx: AdapterContext<'a>) -> Self {
        Self { functions, ctx }
    }

    fn name(&self) -> &str {
        &self.ctx.config.function_name
    }

    pub fn definition<'d>(&'d self, role: &'d RoleHandle, code: &'d [u8]) -> FunctionDefinition<'d> {
        let settings = &self.ctx.config.function;
        FunctionDefinition {
            name: self.name(),
            role_arn: &role.arn,
            runtime: &settings.runtime,
            handler: &settings.handler,
            timeout_secs: settings.timeout_secs,
            memory_mb: settings.memory_mb,
            environment: BTreeMap::from([(
                TABLE_NAME_ENV.to_string(),
                self.ctx.config.table_name.clone(),
            )]),
            code,
        }
    }

    /// Registers the function with `code`, or replaces the code of the
    /// existing function in place.
    ///
    /// While the role is still propagating the service refuses to assume it;
    /// those refusals are retried within the role propagation window.
    pub fn ensure(
        &self,
        role: &RoleHandle,
        code: &[u8],
    ) -> Result<Ensured<FunctionHandle>, AdapterError> {
        let name = self.name();
        let policy = self.ctx.config.role_propagation;
        let definition = self.definition(role, code);
        let on_wait = |duration| {
            self.ctx
                .wait(ResourceKind::Function, name, WaitReason::RolePropagation, duration)
        };

        match retry_while_transient(&policy, on_wait, || {
            self.functions.create_function(&definition)
        }) {
            Ok(handle) => return Ok(Ensured::created(handle)),
            Err(error) if error.is(ServiceErrorKind::AlreadyExists) => {
                tracing::info!(function = name, "function already exists, updating its code");
            }
            Err(error) => return Err(AdapterError::from_service("lambda:CreateFunction", error)),
        }

        retry_while_transient(&policy, on_wait, || {
            self.functions.update_function_code(name, code)
        })
        .map_err(|error| AdapterError::from_service("lambda:UpdateFunctionCode", error))?;

        let description = self
            .functions
            .get_function(name)
            .map_err(|error| AdapterError::from_service("lambda:GetFunction", error))?;
        Ok(Ensured::updated(FunctionHandle {
            name: description.name,
            arn: description.arn,
        }))
    }
}

impl ManagedResource for FunctionAdapter<'_> {
    fn spec(&self) -> ResourceSpec {
        ResourceSpec::for_kind(ResourceKind::Function, self.ctx.config)
    }

    fn describe(&self) -> Result<ProvisioningState, AdapterError> {
        match self.functions.get_function(self.name()) {
            Ok(description) => Ok(description.state),
            Err(error) if error.is_not_found() => Ok(ProvisioningState::Absent),
            Err(error) => Err(AdapterError::from_service("lambda:GetFunction", error)),
        }
    }

    fn delete(&self) -> Result<DeleteOutcome, AdapterError> {
        match self.functions.delete_function(self.name()) {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(error) if error.is_not_found() => Ok(DeleteOutcome::AlreadyAbsent),
            Err(error) => Err(AdapterError::from_service("lambda:DeleteFunction", error)),
        }
    }
}
