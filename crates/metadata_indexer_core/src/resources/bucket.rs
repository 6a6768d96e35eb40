use super::{AdapterContext, ManagedResource};
use crate::error::{AdapterError, ServiceErrorKind};
use crate::resource::{
    BucketHandle, DeleteOutcome, Ensured, ProvisioningState, ResourceKind, ResourceSpec,
};
use crate::services::ObjectStorageService;

pub struct BucketAdapter<'a> {
    storage: &'a dyn ObjectStorageService,
    ctx: AdapterContext<'a>,
}

impl<'a> BucketAdapter<'a> {
    pub fn new(storage: &'a dyn ObjectStorageService, ctx: AdapterContext<'a>) -> Self {
        Self { storage, ctx }
    }

    fn name(&self) -> &str {
        &self.ctx.config.bucket_name
    }

    pub fn ensure(&self) -> Result<Ensured<BucketHandle>, AdapterError> {
        let name = self.name();
        let location_constraint = self.ctx.config.location_constraint();
        tracing::debug!(
            bucket = name,
            region = %self.ctx.config.region,
            ?location_constraint,
            "creating bucket"
        );

        let handle = BucketHandle {
            name: name.to_string(),
        };
        match self.storage.create_bucket(name, location_constraint) {
            Ok(()) => Ok(Ensured::created(handle)),
            Err(error) if error.is(ServiceErrorKind::AlreadyExists) => {
                tracing::info!(bucket = name, code = %error.code, "bucket already exists, reusing it");
                Ok(Ensured::reused(handle))
            }
            Err(error) => Err(AdapterError::from_service("s3:CreateBucket", error)),
        }
    }
}

impl ManagedResource for BucketAdapter<'_> {
    fn spec(&self) -> ResourceSpec {
        ResourceSpec::for_kind(ResourceKind::Bucket, self.ctx.config)
    }

    fn describe(&self) -> Result<ProvisioningState, AdapterError> {
        match self.storage.head_bucket(self.name()) {
            Ok(()) => Ok(ProvisioningState::Active),
            Err(error) if error.is_not_found() => Ok(ProvisioningState::Absent),
            Err(error) => Err(AdapterError::from_service("s3:HeadBucket", error)),
        }
    }

    /// A non-empty bucket cannot be deleted, so its objects go first.
    fn delete(&self) -> Result<DeleteOutcome, AdapterError> {
        let name = self.name();
        match self.storage.empty_bucket(name) {
            Ok(removed) => {
                tracing::info!(bucket = name, removed, "emptied bucket");
            }
            Err(error) if error.is_not_found() => return Ok(DeleteOutcome::AlreadyAbsent),
            Err(error) => return Err(AdapterError::from_service("s3:DeleteObject", error)),
        }

        match self.storage.delete_bucket(name) {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(error) if error.is_not_found() => Ok(DeleteOutcome::AlreadyAbsent),
            Err(error) => Err(AdapterError::from_service("s3:DeleteBucket", error)),
        }
    }
}
