use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Event, LambdaFunctionConfiguration,
    NotificationConfiguration,
};
use metadata_indexer_core::error::ServiceError;
use metadata_indexer_core::services::{EventSubscription, ObjectStorageService};

use super::blocking::BlockingBridge;
use super::classify::{build_error, service_error};

pub struct AwsObjectStorage {
    client: aws_sdk_s3::Client,
    bridge: BlockingBridge,
}

impl AwsObjectStorage {
    pub fn new(client: aws_sdk_s3::Client, bridge: BlockingBridge) -> Self {
        Self { client, bridge }
    }
}

fn notification_configuration(
    subscription: Option<&EventSubscription>,
) -> Result<NotificationConfiguration, ServiceError> {
    let mut builder = NotificationConfiguration::builder();
    if let Some(subscription) = subscription {
        let mut function = LambdaFunctionConfiguration::builder()
            .lambda_function_arn(&subscription.function_arn);
        for event in &subscription.events {
            function = function.events(Event::from(event.as_str()));
        }
        builder = builder.lambda_function_configurations(function.build().map_err(build_error)?);
    }
    Ok(builder.build())
}

impl ObjectStorageService for AwsObjectStorage {
    fn create_bucket(
        &self,
        name: &str,
        location_constraint: Option<&str>,
    ) -> Result<(), ServiceError> {
        let client = self.client.clone();
        let bucket = name.to_string();
        let configuration = location_constraint.map(|region| {
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region))
                .build()
        });

        self.bridge.block_on(async move {
            client
                .create_bucket()
                .bucket(bucket)
                .set_create_bucket_configuration(configuration)
                .send()
                .await
                .map(|_| ())
                .map_err(service_error)
        })
    }

    fn head_bucket(&self, name: &str) -> Result<(), ServiceError> {
        let client = self.client.clone();
        let bucket = name.to_string();

        self.bridge.block_on(async move {
            client
                .head_bucket()
                .bucket(bucket)
                .send()
                .await
                .map(|_| ())
                .map_err(service_error)
        })
    }

    fn empty_bucket(&self, name: &str) -> Result<usize, ServiceError> {
        let client = self.client.clone();
        let bucket = name.to_string();

        self.bridge.block_on(async move {
            let mut removed = 0;
            let mut continuation_token: Option<String> = None;
            loop {
                let page = client
                    .list_objects_v2()
                    .bucket(&bucket)
                    .set_continuation_token(continuation_token.take())
                    .send()
                    .await
                    .map_err(service_error)?;

                for key in page.contents().iter().filter_map(|object| object.key()) {
                    client
                        .delete_object()
                        .bucket(&bucket)
                        .key(key)
                        .send()
                        .await
                        .map_err(service_error)?;
                    removed += 1;
                }

                match page.next_continuation_token() {
                    Some(token) if page.is_truncated().unwrap_or(false) => {
                        continuation_token = Some(token.to_string());
                    }
                    _ => return Ok(removed),
                }
            }
        })
    }

    fn delete_bucket(&self, name: &str) -> Result<(), ServiceError> {
        let client = self.client.clone();
        let bucket = name.to_string();

        self.bridge.block_on(async move {
            client
                .delete_bucket()
                .bucket(bucket)
                .send()
                .await
                .map(|_| ())
                .map_err(service_error)
        })
    }

    fn put_notification(
        &self,
        bucket: &str,
        subscription: Option<&EventSubscription>,
    ) -> Result<(), ServiceError> {
        let configuration = notification_configuration(subscription)?;
        let client = self.client.clone();
        let bucket = bucket.to_string();

        self.bridge.block_on(async move {
            client
                .put_bucket_notification_configuration()
                .bucket(bucket)
                .notification_configuration(configuration)
                .send()
                .await
                .map(|_| ())
                .map_err(service_error)
        })
    }

    fn get_notification(&self, bucket: &str) -> Result<Vec<EventSubscription>, ServiceError> {
        let client = self.client.clone();
        let bucket = bucket.to_string();

        self.bridge.block_on(async move {
            let output = client
                .get_bucket_notification_configuration()
                .bucket(bucket)
                .send()
                .await
                .map_err(service_error)?;
            Ok(output
                .lambda_function_configurations()
                .iter()
                .map(|configuration| EventSubscription {
                    function_arn: configuration.lambda_function_arn().to_string(),
                    events: configuration
                        .events()
                        .iter()
                        .map(|event| event.as_str().to_string())
                        .collect(),
                })
                .collect())
        })
    }
}
