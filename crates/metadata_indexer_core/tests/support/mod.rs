#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use metadata_indexer_core::config::{PipelineConfig, PropagationPolicy, TablePollPolicy};
use metadata_indexer_core::error::{ServiceError, ServiceErrorKind};
use metadata_indexer_core::observer::{ProgressEvent, ProgressObserver, Transition};
use metadata_indexer_core::readiness::Sleeper;
use metadata_indexer_core::resource::{FunctionHandle, ProvisioningState, RoleHandle};
use metadata_indexer_core::resources::trigger::NOTIFICATION_SERVICE_PRINCIPAL;
use metadata_indexer_core::services::{
    EventSubscription, FunctionDefinition, FunctionDescription, FunctionService, IdentityService,
    InvokePermission, ObjectStorageService, ServicePorts, TableDefinition, TableDescription,
    TableService,
};

const ACCOUNT: &str = "123456789012";

pub fn test_config(region: &str) -> PipelineConfig {
    PipelineConfig::new("demo-indexer", region)
        .expect("test config should be valid")
        .with_role_propagation(PropagationPolicy {
            settle_delay: Duration::from_secs(10),
            retry_interval: Duration::from_secs(3),
            retry_timeout: Duration::from_secs(9),
        })
        .with_permission_propagation(PropagationPolicy {
            settle_delay: Duration::from_secs(5),
            retry_interval: Duration::from_secs(2),
            retry_timeout: Duration::from_secs(6),
        })
        .with_table_poll(TablePollPolicy {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(10),
        })
}

#[derive(Debug, Clone)]
pub struct FakeRole {
    pub arn: String,
    pub policies: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct FakeTable {
    pub definition: TableDefinition,
    pub arn: String,
    pub creating_describes_left: usize,
    pub deleting: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FakeBucket {
    pub location_constraint: Option<String>,
    pub objects: usize,
    pub subscription: Option<EventSubscription>,
}

#[derive(Debug, Clone)]
pub struct FakeFunction {
    pub arn: String,
    pub role_arn: String,
    pub runtime: String,
    pub environment: BTreeMap<String, String>,
    pub code: Vec<u8>,
    pub permissions: BTreeMap<String, InvokePermission>,
}

#[derive(Default)]
struct CloudState {
    roles: BTreeMap<String, FakeRole>,
    tables: BTreeMap<String, FakeTable>,
    buckets: BTreeMap<String, FakeBucket>,
    functions: BTreeMap<String, FakeFunction>,
    calls: Vec<String>,
    failures: HashMap<String, ServiceError>,
    transient_failures: HashMap<String, usize>,
    table_activation_describes: usize,
}

/// In-memory cloud implementing every service port, with a call log and
/// per-operation failure injection.
#[derive(Default)]
pub struct FakeCloud {
    state: Mutex<CloudState>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ports(&self) -> ServicePorts<'_> {
        ServicePorts {
            identity: self,
            tables: self,
            storage: self,
            functions: self,
        }
    }

    /// Every call to `operation` fails with `kind` until cleared.
    pub fn fail(&self, operation: &str, kind: ServiceErrorKind, code: &str) {
        self.lock().failures.insert(
            operation.to_string(),
            ServiceError::new(kind, code, "injected failure"),
        );
    }

    pub fn clear_failure(&self, operation: &str) {
        self.lock().failures.remove(operation);
    }

    /// The next `times` calls to `operation` fail as not yet propagated.
    pub fn fail_transiently(&self, operation: &str, times: usize) {
        self.lock()
            .transient_failures
            .insert(operation.to_string(), times);
    }

    /// Newly created tables report `Creating` for this many describes.
    pub fn set_table_activation_describes(&self, describes: usize) {
        self.lock().table_activation_describes = describes;
    }

    pub fn seed_active_table(&self, config: &PipelineConfig) {
        self.seed_table(config, 0, false);
    }

    /// The table reports `Creating` for the next `describes` describes.
    pub fn seed_creating_table(&self, config: &PipelineConfig, describes: usize) {
        self.seed_table(config, describes, false);
    }

    /// The table has a delete in flight: describes report `Deleting`.
    pub fn seed_deleting_table(&self, config: &PipelineConfig) {
        self.seed_table(config, 0, true);
    }

    fn seed_table(&self, config: &PipelineConfig, creating_describes_left: usize, deleting: bool) {
        let name = config.table_name.clone();
        let arn = table_arn(&name);
        self.lock().tables.insert(
            name.clone(),
            FakeTable {
                definition: TableDefinition {
                    name,
                    partition_key: config.partition_key.clone(),
                    read_capacity_units: 1,
                    write_capacity_units: 1,
                },
                arn,
                creating_describes_left,
                deleting,
            },
        );
    }

    pub fn put_objects(&self, bucket: &str, count: usize) {
        if let Some(bucket) = self.lock().buckets.get_mut(bucket) {
            bucket.objects += count;
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.as_str() == operation)
            .count()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn role(&self, name: &str) -> Option<FakeRole> {
        self.lock().roles.get(name).cloned()
    }

    pub fn table(&self, name: &str) -> Option<FakeTable> {
        self.lock().tables.get(name).cloned()
    }

    pub fn bucket(&self, name: &str) -> Option<FakeBucket> {
        self.lock().buckets.get(name).cloned()
    }

    pub fn function(&self, name: &str) -> Option<FakeFunction> {
        self.lock().functions.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        let state = self.lock();
        state.roles.is_empty()
            && state.tables.is_empty()
            && state.buckets.is_empty()
            && state.functions.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CloudState> {
        self.state.lock().expect("poisoned mutex")
    }

    /// Logs the call and applies injected failures. Returns the locked state
    /// so the operation can proceed atomically.
    fn enter(&self, operation: &str) -> Result<std::sync::MutexGuard<'_, CloudState>, ServiceError> {
        let mut state = self.lock();
        state.calls.push(operation.to_string());

        if let Some(error) = state.failures.get(operation) {
            return Err(error.clone());
        }
        if let Some(remaining) = state.transient_failures.get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ServiceError::new(
                    ServiceErrorKind::TransientUnavailable,
                    "Throttling",
                    "injected transient failure",
                ));
            }
        }
        Ok(state)
    }
}

fn not_found(code: &str, what: &str) -> ServiceError {
    ServiceError::new(ServiceErrorKind::NotFound, code, format!("{what} not found"))
}

fn role_arn(name: &str) -> String {
    format!("arn:aws:iam::{ACCOUNT}:role/{name}")
}

fn table_arn(name: &str) -> String {
    format!("arn:aws:dynamodb:eu-central-1:{ACCOUNT}:table/{name}")
}

fn function_arn(name: &str) -> String {
    format!("arn:aws:lambda:eu-central-1:{ACCOUNT}:function:{name}")
}

impl IdentityService for FakeCloud {
    fn create_role(&self, name: &str, trust_policy: &str) -> Result<RoleHandle, ServiceError> {
        let mut state = self.enter("iam:CreateRole")?;
        assert!(trust_policy.contains("lambda.amazonaws.com"));
        if state.roles.contains_key(name) {
            return Err(ServiceError::new(
                ServiceErrorKind::AlreadyExists,
                "EntityAlreadyExists",
                "role exists",
            ));
        }
        let arn = role_arn(name);
        state.roles.insert(
            name.to_string(),
            FakeRole {
                arn: arn.clone(),
                policies: BTreeSet::new(),
            },
        );
        Ok(RoleHandle {
            name: name.to_string(),
            arn,
        })
    }

    fn get_role(&self, name: &str) -> Result<RoleHandle, ServiceError> {
        let state = self.enter("iam:GetRole")?;
        state
            .roles
            .get(name)
            .map(|role| RoleHandle {
                name: name.to_string(),
                arn: role.arn.clone(),
            })
            .ok_or_else(|| not_found("NoSuchEntity", name))
    }

    fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ServiceError> {
        let mut state = self.enter("iam:AttachRolePolicy")?;
        let role = state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| not_found("NoSuchEntity", role_name))?;
        role.policies.insert(policy_arn.to_string());
        Ok(())
    }

    fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ServiceError> {
        let mut state = self.enter("iam:DetachRolePolicy")?;
        let role = state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| not_found("NoSuchEntity", role_name))?;
        if role.policies.remove(policy_arn) {
            Ok(())
        } else {
            Err(not_found("NoSuchEntity", policy_arn))
        }
    }

    fn delete_role(&self, name: &str) -> Result<(), ServiceError> {
        let mut state = self.enter("iam:DeleteRole")?;
        match state.roles.get(name) {
            None => Err(not_found("NoSuchEntity", name)),
            Some(role) if !role.policies.is_empty() => Err(ServiceError::new(
                ServiceErrorKind::Unknown,
                "DeleteConflict",
                "role still has attached policies",
            )),
            Some(_) => {
                state.roles.remove(name);
                Ok(())
            }
        }
    }
}

impl TableService for FakeCloud {
    fn create_table(&self, definition: &TableDefinition) -> Result<(), ServiceError> {
        let mut state = self.enter("dynamodb:CreateTable")?;
        if state.tables.contains_key(&definition.name) {
            return Err(ServiceError::new(
                ServiceErrorKind::ResourceInUse,
                "ResourceInUseException",
                "table exists",
            ));
        }
        let creating_describes_left = state.table_activation_describes;
        state.tables.insert(
            definition.name.clone(),
            FakeTable {
                definition: definition.clone(),
                arn: table_arn(&definition.name),
                creating_describes_left,
                deleting: false,
            },
        );
        Ok(())
    }

    fn describe_table(&self, name: &str) -> Result<TableDescription, ServiceError> {
        let mut state = self.enter("dynamodb:DescribeTable")?;
        let table = state
            .tables
            .get_mut(name)
            .ok_or_else(|| not_found("ResourceNotFoundException", name))?;
        let table_state = if table.deleting {
            ProvisioningState::Deleting
        } else if table.creating_describes_left == 0 {
            ProvisioningState::Active
        } else {
            table.creating_describes_left -= 1;
            ProvisioningState::Creating
        };
        Ok(TableDescription {
            name: name.to_string(),
            arn: table.arn.clone(),
            state: table_state,
        })
    }

    fn delete_table(&self, name: &str) -> Result<(), ServiceError> {
        let mut state = self.enter("dynamodb:DeleteTable")?;
        let table = state
            .tables
            .get(name)
            .ok_or_else(|| not_found("ResourceNotFoundException", name))?;
        if table.deleting || table.creating_describes_left > 0 {
            return Err(ServiceError::new(
                ServiceErrorKind::ResourceInUse,
                "ResourceInUseException",
                "table is being created, updated or deleted",
            ));
        }
        state.tables.remove(name);
        Ok(())
    }
}

impl ObjectStorageService for FakeCloud {
    fn create_bucket(
        &self,
        name: &str,
        location_constraint: Option<&str>,
    ) -> Result<(), ServiceError> {
        let mut state = self.enter("s3:CreateBucket")?;
        if state.buckets.contains_key(name) {
            return Err(ServiceError::new(
                ServiceErrorKind::AlreadyExists,
                "BucketAlreadyOwnedByYou",
                "bucket exists",
            ));
        }
        state.buckets.insert(
            name.to_string(),
            FakeBucket {
                location_constraint: location_constraint.map(str::to_string),
                ..FakeBucket::default()
            },
        );
        Ok(())
    }

    fn head_bucket(&self, name: &str) -> Result<(), ServiceError> {
        let state = self.enter("s3:HeadBucket")?;
        if state.buckets.contains_key(name) {
            Ok(())
        } else {
            Err(not_found("NotFound", name))
        }
    }

    fn empty_bucket(&self, name: &str) -> Result<usize, ServiceError> {
        let mut state = self.enter("s3:EmptyBucket")?;
        let bucket = state
            .buckets
            .get_mut(name)
            .ok_or_else(|| not_found("NoSuchBucket", name))?;
        Ok(std::mem::take(&mut bucket.objects))
    }

    fn delete_bucket(&self, name: &str) -> Result<(), ServiceError> {
        let mut state = self.enter("s3:DeleteBucket")?;
        match state.buckets.get(name) {
            None => Err(not_found("NoSuchBucket", name)),
            Some(bucket) if bucket.objects > 0 => Err(ServiceError::new(
                ServiceErrorKind::Unknown,
                "BucketNotEmpty",
                "bucket is not empty",
            )),
            Some(_) => {
                state.buckets.remove(name);
                Ok(())
            }
        }
    }

    fn put_notification(
        &self,
        bucket: &str,
        subscription: Option<&EventSubscription>,
    ) -> Result<(), ServiceError> {
        let mut state = self.enter("s3:PutBucketNotificationConfiguration")?;
        if !state.buckets.contains_key(bucket) {
            return Err(not_found("NoSuchBucket", bucket));
        }

        if let Some(subscription) = subscription {
            let source_arn = format!("arn:aws:s3:::{bucket}");
            let permitted = state.functions.values().any(|function| {
                function.arn == subscription.function_arn
                    && function.permissions.values().any(|permission| {
                        permission.principal == NOTIFICATION_SERVICE_PRINCIPAL
                            && permission.source_arn == source_arn
                    })
            });
            if !permitted {
                return Err(ServiceError::new(
                    ServiceErrorKind::TransientUnavailable,
                    "InvalidArgument",
                    "Unable to validate the following destination configurations",
                ));
            }
        }

        if let Some(record) = state.buckets.get_mut(bucket) {
            record.subscription = subscription.cloned();
        }
        Ok(())
    }

    fn get_notification(&self, bucket: &str) -> Result<Vec<EventSubscription>, ServiceError> {
        let state = self.enter("s3:GetBucketNotificationConfiguration")?;
        state
            .buckets
            .get(bucket)
            .map(|record| record.subscription.iter().cloned().collect())
            .ok_or_else(|| not_found("NoSuchBucket", bucket))
    }
}

impl FunctionService for FakeCloud {
    fn create_function(
        &self,
        definition: &FunctionDefinition<'_>,
    ) -> Result<FunctionHandle, ServiceError> {
        let mut state = self.enter("lambda:CreateFunction")?;
        if state.functions.contains_key(definition.name) {
            return Err(ServiceError::new(
                ServiceErrorKind::AlreadyExists,
                "ResourceConflictException",
                "function exists",
            ));
        }
        if !state.roles.values().any(|role| role.arn == definition.role_arn) {
            return Err(ServiceError::new(
                ServiceErrorKind::TransientUnavailable,
                "InvalidParameterValueException",
                "The role defined for the function cannot be assumed by Lambda.",
            ));
        }

        let arn = function_arn(definition.name);
        state.functions.insert(
            definition.name.to_string(),
            FakeFunction {
                arn: arn.clone(),
                role_arn: definition.role_arn.to_string(),
                runtime: definition.runtime.to_string(),
                environment: definition.environment.clone(),
                code: definition.code.to_vec(),
                permissions: BTreeMap::new(),
            },
        );
        Ok(FunctionHandle {
            name: definition.name.to_string(),
            arn,
        })
    }

    fn update_function_code(&self, name: &str, code: &[u8]) -> Result<(), ServiceError> {
        let mut state = self.enter("lambda:UpdateFunctionCode")?;
        let function = state
            .functions
            .get_mut(name)
            .ok_or_else(|| not_found("ResourceNotFoundException", name))?;
        function.code = code.to_vec();
        Ok(())
    }

    fn get_function(&self, name: &str) -> Result<FunctionDescription, ServiceError> {
        let state = self.enter("lambda:GetFunction")?;
        state
            .functions
            .get(name)
            .map(|function| FunctionDescription {
                name: name.to_string(),
                arn: function.arn.clone(),
                state: ProvisioningState::Active,
            })
            .ok_or_else(|| not_found("ResourceNotFoundException", name))
    }

    fn delete_function(&self, name: &str) -> Result<(), ServiceError> {
        let mut state = self.enter("lambda:DeleteFunction")?;
        state
            .functions
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found("ResourceNotFoundException", name))
    }

    fn add_permission(&self, permission: &InvokePermission) -> Result<(), ServiceError> {
        let mut state = self.enter("lambda:AddPermission")?;
        let function = state
            .functions
            .get_mut(&permission.function_name)
            .ok_or_else(|| not_found("ResourceNotFoundException", &permission.function_name))?;
        if function.permissions.contains_key(&permission.statement_id) {
            return Err(ServiceError::new(
                ServiceErrorKind::AlreadyExists,
                "ResourceConflictException",
                "statement id exists",
            ));
        }
        function
            .permissions
            .insert(permission.statement_id.clone(), permission.clone());
        Ok(())
    }

    fn remove_permission(
        &self,
        function_name: &str,
        statement_id: &str,
    ) -> Result<(), ServiceError> {
        let mut state = self.enter("lambda:RemovePermission")?;
        let function = state
            .functions
            .get_mut(function_name)
            .ok_or_else(|| not_found("ResourceNotFoundException", function_name))?;
        function
            .permissions
            .remove(statement_id)
            .map(|_| ())
            .ok_or_else(|| not_found("ResourceNotFoundException", statement_id))
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().expect("poisoned mutex").clone()
    }

    pub fn total(&self) -> Duration {
        self.slept().into_iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.lock().expect("poisoned mutex").push(duration);
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().expect("poisoned mutex").clone()
    }

    /// `(resource, transition)` pairs without the started markers.
    pub fn outcomes(&self) -> Vec<(String, Transition)> {
        self.events()
            .into_iter()
            .filter(|event| event.transition != Transition::Started)
            .filter(|event| !matches!(event.transition, Transition::Waiting { .. }))
            .map(|event| (event.resource.as_str().to_string(), event.transition))
            .collect()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_event(&self, event: &ProgressEvent) {
        self.events.lock().expect("poisoned mutex").push(event.clone());
    }
}
