use crate::error::ServiceError;

pub const OBJECT_CREATED_EVENTS: &str = "s3:ObjectCreated:*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSubscription {
    pub function_arn: String,
    pub events: Vec<String>,
}

impl EventSubscription {
    pub fn object_created(function_arn: impl Into<String>) -> Self {
        Self {
            function_arn: function_arn.into(),
            events: vec![OBJECT_CREATED_EVENTS.to_string()],
        }
    }
}

pub trait ObjectStorageService {
    /// `location_constraint` is `None` exactly when the bucket lives in the
    /// provider default region.
    fn create_bucket(&self, name: &str, location_constraint: Option<&str>)
        -> Result<(), ServiceError>;
    fn head_bucket(&self, name: &str) -> Result<(), ServiceError>;
    /// Deletes every object in the bucket and returns how many were removed.
    fn empty_bucket(&self, name: &str) -> Result<usize, ServiceError>;
    fn delete_bucket(&self, name: &str) -> Result<(), ServiceError>;
    /// Replaces the bucket's notification configuration; `None` clears it.
    fn put_notification(
        &self,
        bucket: &str,
        subscription: Option<&EventSubscription>,
    ) -> Result<(), ServiceError>;
    fn get_notification(&self, bucket: &str) -> Result<Vec<EventSubscription>, ServiceError>;
}
