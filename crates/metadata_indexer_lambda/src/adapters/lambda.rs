use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{Environment, FunctionCode, Runtime, State};
use metadata_indexer_core::error::{ServiceError, ServiceErrorKind};
use metadata_indexer_core::resource::{FunctionHandle, ProvisioningState};
use metadata_indexer_core::services::{
    FunctionDefinition, FunctionDescription, FunctionService, InvokePermission,
};

use super::blocking::BlockingBridge;
use super::classify::{missing_field, service_error, service_error_with};

/// While a previous deployment is still being applied the service answers
/// code updates with a conflict; that clears on its own.
const UPDATE_CODE_OVERRIDES: &[(&str, ServiceErrorKind)] = &[(
    "ResourceConflictException",
    ServiceErrorKind::TransientUnavailable,
)];

pub struct AwsFunctionService {
    client: aws_sdk_lambda::Client,
    bridge: BlockingBridge,
}

impl AwsFunctionService {
    pub fn new(client: aws_sdk_lambda::Client, bridge: BlockingBridge) -> Self {
        Self { client, bridge }
    }
}

pub fn function_state(state: Option<&State>) -> ProvisioningState {
    match state {
        Some(State::Pending) => ProvisioningState::Creating,
        Some(State::Failed) => ProvisioningState::Failed,
        // Inactive functions are reactivated on the next invocation.
        _ => ProvisioningState::Active,
    }
}

impl FunctionService for AwsFunctionService {
    fn create_function(
        &self,
        definition: &FunctionDefinition<'_>,
    ) -> Result<FunctionHandle, ServiceError> {
        let mut environment = Environment::builder();
        for (key, value) in &definition.environment {
            environment = environment.variables(key, value);
        }
        let code = FunctionCode::builder()
            .zip_file(Blob::new(definition.code.to_vec()))
            .build();

        let request = self
            .client
            .create_function()
            .function_name(definition.name)
            .role(definition.role_arn)
            .runtime(Runtime::from(definition.runtime))
            .handler(definition.handler)
            .timeout(definition.timeout_secs)
            .memory_size(definition.memory_mb)
            .environment(environment.build())
            .code(code);
        let name = definition.name.to_string();

        self.bridge.block_on(async move {
            let output = request.send().await.map_err(service_error)?;
            let arn = output
                .function_arn()
                .ok_or_else(|| missing_field("CreateFunction", "function ARN"))?;
            Ok(FunctionHandle {
                name,
                arn: arn.to_string(),
            })
        })
    }

    fn update_function_code(&self, name: &str, code: &[u8]) -> Result<(), ServiceError> {
        let request = self
            .client
            .update_function_code()
            .function_name(name)
            .zip_file(Blob::new(code.to_vec()));

        self.bridge.block_on(async move {
            request
                .send()
                .await
                .map(|_| ())
                .map_err(|error| service_error_with(error, UPDATE_CODE_OVERRIDES))
        })
    }

    fn get_function(&self, name: &str) -> Result<FunctionDescription, ServiceError> {
        let client = self.client.clone();
        let function_name = name.to_string();

        self.bridge.block_on(async move {
            let output = client
                .get_function()
                .function_name(&function_name)
                .send()
                .await
                .map_err(service_error)?;
            let configuration = output
                .configuration()
                .ok_or_else(|| missing_field("GetFunction", "configuration"))?;
            let arn = configuration
                .function_arn()
                .ok_or_else(|| missing_field("GetFunction", "function ARN"))?;
            Ok(FunctionDescription {
                arn: arn.to_string(),
                state: function_state(configuration.state()),
                name: function_name,
            })
        })
    }

    fn delete_function(&self, name: &str) -> Result<(), ServiceError> {
        let request = self.client.delete_function().function_name(name);

        self.bridge.block_on(async move {
            request.send().await.map(|_| ()).map_err(service_error)
        })
    }

    fn add_permission(&self, permission: &InvokePermission) -> Result<(), ServiceError> {
        let request = self
            .client
            .add_permission()
            .function_name(&permission.function_name)
            .statement_id(&permission.statement_id)
            .action(&permission.action)
            .principal(&permission.principal)
            .source_arn(&permission.source_arn);

        self.bridge.block_on(async move {
            request.send().await.map(|_| ()).map_err(service_error)
        })
    }

    fn remove_permission(
        &self,
        function_name: &str,
        statement_id: &str,
    ) -> Result<(), ServiceError> {
        let request = self
            .client
            .remove_permission()
            .function_name(function_name)
            .statement_id(statement_id);

        self.bridge.block_on(async move {
            request.send().await.map(|_| ()).map_err(service_error)
        })
    }
}
