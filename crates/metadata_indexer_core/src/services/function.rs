use std::collections::BTreeMap;

use crate::error::ServiceError;
use crate::resource::{FunctionHandle, ProvisioningState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition<'a> {
    pub name: &'a str,
    pub role_arn: &'a str,
    pub runtime: &'a str,
    pub handler: &'a str,
    pub timeout_secs: i32,
    pub memory_mb: i32,
    pub environment: BTreeMap<String, String>,
    pub code: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescription {
    pub name: String,
    pub arn: String,
    pub state: ProvisioningState,
}

/// Resource-policy statement allowing a service principal to invoke a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokePermission {
    pub function_name: String,
    pub statement_id: String,
    pub action: String,
    pub principal: String,
    pub source_arn: String,
}

pub trait FunctionService {
    fn create_function(
        &self,
        definition: &FunctionDefinition<'_>,
    ) -> Result<FunctionHandle, ServiceError>;
    fn update_function_code(&self, name: &str, code: &[u8]) -> Result<(), ServiceError>;
    fn get_function(&self, name: &str) -> Result<FunctionDescription, ServiceError>;
    fn delete_function(&self, name: &str) -> Result<(), ServiceError>;
    fn add_permission(&self, permission: &InvokePermission) -> Result<(), ServiceError>;
    fn remove_permission(&self, function_name: &str, statement_id: &str)
        -> Result<(), ServiceError>;
}
