use crate::error::ServiceError;
use crate::resource::RoleHandle;

pub trait IdentityService {
    fn create_role(&self, name: &str, trust_policy: &str) -> Result<RoleHandle, ServiceError>;
    fn get_role(&self, name: &str) -> Result<RoleHandle, ServiceError>;
    fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ServiceError>;
    fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ServiceError>;
    fn delete_role(&self, name: &str) -> Result<(), ServiceError>;
}
