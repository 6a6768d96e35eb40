use super::{AdapterContext, ManagedResource};
use crate::error::{AdapterError, ServiceErrorKind};
use crate::observer::WaitReason;
use crate::readiness::retry_while_transient;
use crate::resource::{
    BucketHandle, DeleteOutcome, Ensured, FunctionHandle, ProvisioningState, ResourceKind,
    ResourceSpec, TriggerHandle,
};
use crate::services::object_storage::OBJECT_CREATED_EVENTS;
use crate::services::{EventSubscription, FunctionService, InvokePermission, ObjectStorageService};

pub const NOTIFICATION_SERVICE_PRINCIPAL: &str = "s3.amazonaws.com";
pub const INVOKE_ACTION: &str = "lambda:InvokeFunction";

pub struct TriggerAdapter<'a> {
    functions: &'a dyn FunctionService,
    storage: &'a dyn ObjectStorageService,
    ctx: AdapterContext<'a>,
}

impl<'a> TriggerAdapter<'a> {
    pub fn new(
        functions: &'a dyn FunctionService,
        storage: &'a dyn ObjectStorageService,
        ctx: AdapterContext<'a>,
    ) -> Self {
        Self {
            functions,
            storage,
            ctx,
        }
    }

    fn statement_id(&self) -> String {
        self.ctx.config.trigger_statement_id()
    }

    pub fn invoke_permission(&self, function: &FunctionHandle) -> InvokePermission {
        InvokePermission {
            function_name: function.name.clone(),
            statement_id: self.statement_id(),
            action: INVOKE_ACTION.to_string(),
            principal: NOTIFICATION_SERVICE_PRINCIPAL.to_string(),
            source_arn: self.ctx.config.bucket_arn(),
        }
    }

    /// Grants the bucket permission to invoke the function, then subscribes
    /// the function to object-created events.
    ///
    /// The subscription is validated by the storage service against the
    /// function's resource policy, so it is only attempted after the grant
    /// has had its settle delay, and retried while the grant is not yet
    /// visible.
    pub fn ensure(
        &self,
        function: &FunctionHandle,
        bucket: &BucketHandle,
    ) -> Result<Ensured<TriggerHandle>, AdapterError> {
        let statement_id = self.statement_id();
        let newly_granted = match self.functions.add_permission(&self.invoke_permission(function)) {
            Ok(()) => true,
            Err(error) if error.is(ServiceErrorKind::AlreadyExists) => {
                tracing::info!(statement_id = %statement_id, "invoke permission already granted");
                false
            }
            Err(error) => return Err(AdapterError::from_service("lambda:AddPermission", error)),
        };

        let policy = self.ctx.config.permission_propagation;
        if newly_granted {
            self.ctx.wait(
                ResourceKind::Trigger,
                &statement_id,
                WaitReason::PermissionPropagation,
                policy.settle_delay,
            );
        }

        let subscription = EventSubscription::object_created(function.arn.clone());
        retry_while_transient(
            &policy,
            |duration| {
                self.ctx.wait(
                    ResourceKind::Trigger,
                    &statement_id,
                    WaitReason::PermissionPropagation,
                    duration,
                )
            },
            || self.storage.put_notification(&bucket.name, Some(&subscription)),
        )
        .map_err(|error| {
            AdapterError::from_service("s3:PutBucketNotificationConfiguration", error)
        })?;

        let handle = TriggerHandle {
            function_name: function.name.clone(),
            bucket_name: bucket.name.clone(),
            statement_id,
        };
        Ok(if newly_granted {
            Ensured::created(handle)
        } else {
            Ensured::reused(handle)
        })
    }
}

impl ManagedResource for TriggerAdapter<'_> {
    fn spec(&self) -> ResourceSpec {
        ResourceSpec::for_kind(ResourceKind::Trigger, self.ctx.config)
    }

    /// Active only when the bucket's configuration routes object-created
    /// events to the current function.
    fn describe(&self) -> Result<ProvisioningState, AdapterError> {
        let function_arn = match self.functions.get_function(&self.ctx.config.function_name) {
            Ok(description) => description.arn,
            Err(error) if error.is_not_found() => return Ok(ProvisioningState::Absent),
            Err(error) => return Err(AdapterError::from_service("lambda:GetFunction", error)),
        };

        let subscriptions = match self.storage.get_notification(&self.ctx.config.bucket_name) {
            Ok(subscriptions) => subscriptions,
            Err(error) if error.is_not_found() => return Ok(ProvisioningState::Absent),
            Err(error) => {
                return Err(AdapterError::from_service(
                    "s3:GetBucketNotificationConfiguration",
                    error,
                ))
            }
        };

        let wired = subscriptions.iter().any(|subscription| {
            subscription.function_arn == function_arn
                && subscription
                    .events
                    .iter()
                    .any(|event| event == OBJECT_CREATED_EVENTS)
        });
        Ok(if wired {
            ProvisioningState::Active
        } else {
            ProvisioningState::Absent
        })
    }

    fn delete(&self) -> Result<DeleteOutcome, AdapterError> {
        let config = self.ctx.config;
        let cleared = match self.storage.put_notification(&config.bucket_name, None) {
            Ok(()) => true,
            Err(error) if error.is_not_found() => false,
            Err(error) => {
                return Err(AdapterError::from_service(
                    "s3:PutBucketNotificationConfiguration",
                    error,
                ))
            }
        };

        let revoked = match self
            .functions
            .remove_permission(&config.function_name, &self.statement_id())
        {
            Ok(()) => true,
            Err(error) if error.is_not_found() => false,
            Err(error) => return Err(AdapterError::from_service("lambda:RemovePermission", error)),
        };

        Ok(if cleared || revoked {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::AlreadyAbsent
        })
    }
}
