use metadata_indexer_core::error::ServiceError;
use metadata_indexer_core::resource::RoleHandle;
use metadata_indexer_core::services::IdentityService;

use super::blocking::BlockingBridge;
use super::classify::{missing_field, service_error};

pub struct AwsIdentityService {
    client: aws_sdk_iam::Client,
    bridge: BlockingBridge,
}

impl AwsIdentityService {
    pub fn new(client: aws_sdk_iam::Client, bridge: BlockingBridge) -> Self {
        Self { client, bridge }
    }
}

fn role_handle(role: Option<&aws_sdk_iam::types::Role>, operation: &str) -> Result<RoleHandle, ServiceError> {
    let role = role.ok_or_else(|| missing_field(operation, "role"))?;
    Ok(RoleHandle {
        name: role.role_name().to_string(),
        arn: role.arn().to_string(),
    })
}

impl IdentityService for AwsIdentityService {
    fn create_role(&self, name: &str, trust_policy: &str) -> Result<RoleHandle, ServiceError> {
        let client = self.client.clone();
        let role_name = name.to_string();
        let document = trust_policy.to_string();

        self.bridge.block_on(async move {
            let output = client
                .create_role()
                .role_name(role_name)
                .assume_role_policy_document(document)
                .send()
                .await
                .map_err(service_error)?;
            role_handle(output.role(), "CreateRole")
        })
    }

    fn get_role(&self, name: &str) -> Result<RoleHandle, ServiceError> {
        let client = self.client.clone();
        let role_name = name.to_string();

        self.bridge.block_on(async move {
            let output = client
                .get_role()
                .role_name(role_name)
                .send()
                .await
                .map_err(service_error)?;
            role_handle(output.role(), "GetRole")
        })
    }

    fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ServiceError> {
        let client = self.client.clone();
        let role_name = role_name.to_string();
        let policy_arn = policy_arn.to_string();

        self.bridge.block_on(async move {
            client
                .attach_role_policy()
                .role_name(role_name)
                .policy_arn(policy_arn)
                .send()
                .await
                .map(|_| ())
                .map_err(service_error)
        })
    }

    fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ServiceError> {
        let client = self.client.clone();
        let role_name = role_name.to_string();
        let policy_arn = policy_arn.to_string();

        self.bridge.block_on(async move {
            client
                .detach_role_policy()
                .role_name(role_name)
                .policy_arn(policy_arn)
                .send()
                .await
                .map(|_| ())
                .map_err(service_error)
        })
    }

    fn delete_role(&self, name: &str) -> Result<(), ServiceError> {
        let client = self.client.clone();
        let role_name = name.to_string();

        self.bridge.block_on(async move {
            client
                .delete_role()
                .role_name(role_name)
                .send()
                .await
                .map(|_| ())
                .map_err(service_error)
        })
    }
}
