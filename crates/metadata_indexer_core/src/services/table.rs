use crate::error::ServiceError;
use crate::resource::ProvisioningState;

/// Single string partition key with fixed provisioned throughput.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: String,
    pub partition_key: String,
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub name: String,
    pub arn: String,
    pub state: ProvisioningState,
}

pub trait TableService {
    /// Returns once the create request is accepted; the table may still be
    /// `Creating`.
    fn create_table(&self, definition: &TableDefinition) -> Result<(), ServiceError>;
    fn describe_table(&self, name: &str) -> Result<TableDescription, ServiceError>;
    fn delete_table(&self, name: &str) -> Result<(), ServiceError>;
}
