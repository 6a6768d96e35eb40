use std::collections::HashMap;

use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, KeySchemaElement, KeyType, ProvisionedThroughput,
    ScalarAttributeType, TableStatus,
};
use metadata_indexer_core::error::ServiceError;
use metadata_indexer_core::indexer::{MetadataRecord, MetadataStore, StoreError};
use metadata_indexer_core::resource::ProvisioningState;
use metadata_indexer_core::services::{TableDefinition, TableDescription, TableService};

use super::blocking::BlockingBridge;
use super::classify::{build_error, missing_field, service_error};

pub const ATTR_FILE_NAME: &str = "file_name";
pub const ATTR_BUCKET_NAME: &str = "bucket_name";
pub const ATTR_FILE_SIZE_BYTES: &str = "file_size_bytes";
pub const ATTR_UPLOAD_TIMESTAMP: &str = "upload_timestamp";
pub const ATTR_PROCESSED_AT: &str = "processed_at";

pub struct AwsTableService {
    client: aws_sdk_dynamodb::Client,
    bridge: BlockingBridge,
}

impl AwsTableService {
    pub fn new(client: aws_sdk_dynamodb::Client, bridge: BlockingBridge) -> Self {
        Self { client, bridge }
    }
}

/// `Updating` tables still serve reads and writes; every terminal or
/// draining status is unusable.
pub fn table_state(status: Option<&TableStatus>) -> ProvisioningState {
    match status {
        Some(TableStatus::Active) | Some(TableStatus::Updating) => ProvisioningState::Active,
        Some(TableStatus::Creating) => ProvisioningState::Creating,
        Some(TableStatus::Deleting) => ProvisioningState::Deleting,
        None => ProvisioningState::Creating,
        Some(_) => ProvisioningState::Failed,
    }
}

impl TableService for AwsTableService {
    fn create_table(&self, definition: &TableDefinition) -> Result<(), ServiceError> {
        let key_schema = KeySchemaElement::builder()
            .attribute_name(&definition.partition_key)
            .key_type(KeyType::Hash)
            .build()
            .map_err(build_error)?;
        let attribute = AttributeDefinition::builder()
            .attribute_name(&definition.partition_key)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(build_error)?;
        let throughput = ProvisionedThroughput::builder()
            .read_capacity_units(definition.read_capacity_units)
            .write_capacity_units(definition.write_capacity_units)
            .build()
            .map_err(build_error)?;

        let client = self.client.clone();
        let table_name = definition.name.clone();
        self.bridge.block_on(async move {
            client
                .create_table()
                .table_name(table_name)
                .key_schema(key_schema)
                .attribute_definitions(attribute)
                .provisioned_throughput(throughput)
                .send()
                .await
                .map(|_| ())
                .map_err(service_error)
        })
    }

    fn describe_table(&self, name: &str) -> Result<TableDescription, ServiceError> {
        let client = self.client.clone();
        let table_name = name.to_string();

        self.bridge.block_on(async move {
            let output = client
                .describe_table()
                .table_name(&table_name)
                .send()
                .await
                .map_err(service_error)?;
            let table = output
                .table()
                .ok_or_else(|| missing_field("DescribeTable", "table"))?;
            Ok(TableDescription {
                arn: table.table_arn().unwrap_or_default().to_string(),
                state: table_state(table.table_status()),
                name: table_name,
            })
        })
    }

    fn delete_table(&self, name: &str) -> Result<(), ServiceError> {
        let client = self.client.clone();
        let table_name = name.to_string();

        self.bridge.block_on(async move {
            client
                .delete_table()
                .table_name(table_name)
                .send()
                .await
                .map(|_| ())
                .map_err(service_error)
        })
    }
}

pub fn record_item(record: &MetadataRecord) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (
            ATTR_FILE_NAME.to_string(),
            AttributeValue::S(record.file_name.clone()),
        ),
        (
            ATTR_BUCKET_NAME.to_string(),
            AttributeValue::S(record.bucket_name.clone()),
        ),
        (
            ATTR_FILE_SIZE_BYTES.to_string(),
            AttributeValue::N(record.file_size_bytes.to_string()),
        ),
        (
            ATTR_UPLOAD_TIMESTAMP.to_string(),
            AttributeValue::S(record.upload_timestamp.clone()),
        ),
        (
            ATTR_PROCESSED_AT.to_string(),
            AttributeValue::S(record.processed_at.clone()),
        ),
    ])
}

/// Writes index rows with unconditional `PutItem`, so a redelivered event
/// replaces the earlier row in full.
pub struct DynamoDbMetadataStore {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
    bridge: BlockingBridge,
}

impl DynamoDbMetadataStore {
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            bridge: BlockingBridge::Ambient,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

impl MetadataStore for DynamoDbMetadataStore {
    fn put_record(&self, record: &MetadataRecord) -> Result<(), StoreError> {
        let client = self.client.clone();
        let table_name = self.table_name.clone();
        let item = record_item(record);

        self.bridge
            .block_on(async move {
                client
                    .put_item()
                    .table_name(table_name)
                    .set_item(Some(item))
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(service_error)
            })
            .map_err(StoreError::from)
    }
}
