//! Maps SDK failures onto the core [`ServiceErrorKind`] taxonomy.
//!
//! Classification is by error code, with two message-based refinements for
//! the propagation races the orchestrator waits out: a freshly created role
//! that the function service cannot assume yet, and a bucket notification
//! whose destination permission is not visible yet.

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use metadata_indexer_core::error::{ServiceError, ServiceErrorKind};

const ALREADY_EXISTS: &[&str] = &[
    "EntityAlreadyExists",
    "BucketAlreadyOwnedByYou",
    "BucketAlreadyExists",
    "ResourceConflictException",
];

const NOT_FOUND: &[&str] = &[
    "NoSuchEntity",
    "ResourceNotFoundException",
    "NoSuchBucket",
    "NotFound",
];

const TRANSIENT: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "ProvisionedThroughputExceededException",
    "RequestLimitExceeded",
    "SlowDown",
    "ServiceUnavailable",
    "ServiceUnavailableException",
    "ServiceFailure",
    "InternalFailure",
    "InternalError",
    "InternalServerError",
    "LimitExceeded",
    "LimitExceededException",
];

const PERMISSION_DENIED: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnrecognizedClientException",
    "InvalidClientTokenId",
    "ExpiredToken",
    "ExpiredTokenException",
];

pub fn classify_code(code: &str, message: &str) -> ServiceErrorKind {
    if ALREADY_EXISTS.contains(&code) {
        ServiceErrorKind::AlreadyExists
    } else if NOT_FOUND.contains(&code) {
        ServiceErrorKind::NotFound
    } else if code == "ResourceInUseException" {
        ServiceErrorKind::ResourceInUse
    } else if TRANSIENT.contains(&code) || is_propagation_race(code, message) {
        ServiceErrorKind::TransientUnavailable
    } else if PERMISSION_DENIED.contains(&code) {
        ServiceErrorKind::PermissionDenied
    } else {
        ServiceErrorKind::Unknown
    }
}

fn is_propagation_race(code: &str, message: &str) -> bool {
    match code {
        "InvalidParameterValueException" => message.contains("cannot be assumed"),
        "InvalidArgument" => message.contains("Unable to validate the following destination"),
        _ => false,
    }
}

/// Classifies any SDK failure. Transport failures that never reached the
/// service are treated as transient.
pub fn service_error<E, R>(error: SdkError<E, R>) -> ServiceError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match &error {
        SdkError::ServiceError(context) => {
            let source = context.err();
            let code = source.code().unwrap_or("Unknown");
            let message = source.message().unwrap_or_default();
            ServiceError::new(classify_code(code, message), code, message)
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => ServiceError::new(
            ServiceErrorKind::TransientUnavailable,
            "DispatchFailure",
            DisplayErrorContext(&error).to_string(),
        ),
        _ => ServiceError::new(
            ServiceErrorKind::Unknown,
            "SdkError",
            DisplayErrorContext(&error).to_string(),
        ),
    }
}

/// Like [`service_error`], with a per-operation override for codes whose
/// meaning depends on the call.
pub fn service_error_with<E, R>(
    error: SdkError<E, R>,
    overrides: &[(&str, ServiceErrorKind)],
) -> ServiceError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let mut classified = service_error(error);
    if let Some((_, kind)) = overrides
        .iter()
        .find(|(code, _)| *code == classified.code)
    {
        classified.kind = *kind;
    }
    classified
}

/// A request the adapter could not even build.
pub fn build_error(error: impl std::fmt::Display) -> ServiceError {
    ServiceError::new(ServiceErrorKind::Unknown, "BuildError", error.to_string())
}

/// A successful response missing a field the adapter depends on.
pub fn missing_field(operation: &str, field: &str) -> ServiceError {
    ServiceError::new(
        ServiceErrorKind::Unknown,
        "MissingField",
        format!("{operation} response has no {field}"),
    )
}
