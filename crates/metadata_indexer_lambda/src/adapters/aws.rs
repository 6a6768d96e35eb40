use aws_config::{BehaviorVersion, Region};
use metadata_indexer_core::services::ServicePorts;

use super::blocking::BlockingBridge;
use super::dynamodb::AwsTableService;
use super::iam::AwsIdentityService;
use super::lambda::AwsFunctionService;
use super::s3::AwsObjectStorage;

/// All four SDK-backed ports, sharing one credential chain and one runtime.
pub struct AwsPorts {
    identity: AwsIdentityService,
    tables: AwsTableService,
    storage: AwsObjectStorage,
    functions: AwsFunctionService,
}

impl AwsPorts {
    /// Loads the default credential chain pinned to `region` on a runtime
    /// owned by the returned ports. Must be called outside any async context.
    pub fn connect(region: &str) -> std::io::Result<Self> {
        let bridge = BlockingBridge::owned()?;
        let sdk_config = bridge.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.to_string()))
                .load(),
        );
        tracing::debug!(region, "loaded AWS configuration");
        Ok(Self::from_sdk_config(&sdk_config, bridge))
    }

    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig, bridge: BlockingBridge) -> Self {
        Self {
            identity: AwsIdentityService::new(aws_sdk_iam::Client::new(sdk_config), bridge.clone()),
            tables: AwsTableService::new(
                aws_sdk_dynamodb::Client::new(sdk_config),
                bridge.clone(),
            ),
            storage: AwsObjectStorage::new(aws_sdk_s3::Client::new(sdk_config), bridge.clone()),
            functions: AwsFunctionService::new(aws_sdk_lambda::Client::new(sdk_config), bridge),
        }
    }

    pub fn ports(&self) -> ServicePorts<'_> {
        ServicePorts {
            identity: &self.identity,
            tables: &self.tables,
            storage: &self.storage,
            functions: &self.functions,
        }
    }
}
