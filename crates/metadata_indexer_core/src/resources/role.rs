use serde_json::json;

use super::{AdapterContext, ManagedResource};
use crate::error::{AdapterError, ServiceErrorKind};
use crate::observer::WaitReason;
use crate::resource::{
    DeleteOutcome, Ensured, ProvisioningState, ResourceKind, ResourceSpec, RoleHandle,
};
use crate::services::IdentityService;

pub const FUNCTION_SERVICE_PRINCIPAL: &str = "lambda.amazonaws.com";
pub const LOG_WRITE_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";
pub const TABLE_ACCESS_POLICY_ARN: &str = "arn:aws:iam::aws:policy/AmazonDynamoDBFullAccess";

/// Exactly the managed policies the indexer function needs.
pub const ROLE_POLICY_ARNS: [&str; 2] = [LOG_WRITE_POLICY_ARN, TABLE_ACCESS_POLICY_ARN];

/// Trust policy letting only the function-execution service assume the role.
pub fn function_trust_policy() -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": FUNCTION_SERVICE_PRINCIPAL },
            "Action": "sts:AssumeRole",
        }],
    })
    .to_string()
}

pub struct RoleAdapter<'a> {
    identity: &'a dyn IdentityService,
    ctx: AdapterContext<'a>,
}

impl<'a> RoleAdapter<'a> {
    pub fn new(identity: &'a dyn IdentityService, ctx: AdapterContext<'a>) -> Self {
        Self { identity, ctx }
    }

    fn name(&self) -> &str {
        &self.ctx.config.role_name
    }

    /// Creates the role, or adopts the existing one, and (re)attaches its
    /// policies. A freshly created role is given the configured settle delay
    /// before its handle is returned.
    pub fn ensure(&self) -> Result<Ensured<RoleHandle>, AdapterError> {
        let name = self.name();
        let created = match self.identity.create_role(name, &function_trust_policy()) {
            Ok(handle) => Some(handle),
            Err(error) if error.is(ServiceErrorKind::AlreadyExists) => {
                tracing::info!(role = name, "role already exists, reusing it");
                None
            }
            Err(error) => return Err(AdapterError::from_service("iam:CreateRole", error)),
        };

        // Attachment is idempotent; repeating it heals a run interrupted
        // between create and attach.
        for policy_arn in ROLE_POLICY_ARNS {
            self.identity
                .attach_role_policy(name, policy_arn)
                .map_err(|error| AdapterError::from_service("iam:AttachRolePolicy", error))?;
        }

        match created {
            Some(handle) => {
                self.ctx.wait(
                    ResourceKind::Role,
                    name,
                    WaitReason::RolePropagation,
                    self.ctx.config.role_propagation.settle_delay,
                );
                Ok(Ensured::created(handle))
            }
            None => self
                .identity
                .get_role(name)
                .map(Ensured::reused)
                .map_err(|error| AdapterError::from_service("iam:GetRole", error)),
        }
    }
}

impl ManagedResource for RoleAdapter<'_> {
    fn spec(&self) -> ResourceSpec {
        ResourceSpec::for_kind(ResourceKind::Role, self.ctx.config)
    }

    fn describe(&self) -> Result<ProvisioningState, AdapterError> {
        match self.identity.get_role(self.name()) {
            Ok(_) => Ok(ProvisioningState::Active),
            Err(error) if error.is_not_found() => Ok(ProvisioningState::Absent),
            Err(error) => Err(AdapterError::from_service("iam:GetRole", error)),
        }
    }

    fn delete(&self) -> Result<DeleteOutcome, AdapterError> {
        let name = self.name();
        for policy_arn in ROLE_POLICY_ARNS {
            match self.identity.detach_role_policy(name, policy_arn) {
                Ok(()) => {}
                Err(error) if error.is_not_found() => {}
                Err(error) => {
                    return Err(AdapterError::from_service("iam:DetachRolePolicy", error))
                }
            }
        }

        match self.identity.delete_role(name) {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(error) if error.is_not_found() => Ok(DeleteOutcome::AlreadyAbsent),
            Err(error) => Err(AdapterError::from_service("iam:DeleteRole", error)),
        }
    }
}
