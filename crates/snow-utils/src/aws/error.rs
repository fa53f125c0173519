//! AWS error classification and handling
//!
//! Classifies SDK errors by `.code()` and HTTP status instead of matching
//! on Debug output, and turns existence checks into [`Probe`] values.

use crate::probe::Probe;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use thiserror::Error;

/// AWS error categories for probing and cleanup logic
#[derive(Debug, Error)]
pub enum AwsError {
    /// Resource was not found (safe to skip in cleanup)
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    /// Name is taken by a resource we cannot access
    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    /// Resource still has dependents (attached policies, objects in a bucket)
    #[error("Resource has dependent objects: {message}")]
    DependencyViolation { message: String },

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, AwsError::AccessDenied { .. })
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &["NoSuchEntity", "NoSuchBucket", "NoSuchKey", "NotFound"];

/// Codes meaning the name exists but belongs to someone else
const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "Forbidden",
    "BucketAlreadyExists",
];

/// Known AWS error codes for dependency violations
const DEPENDENCY_CODES: &[&str] = &["DeleteConflict", "BucketNotEmpty"];

/// Classify an AWS error from its code and message.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound { message },
        Some(c) if ACCESS_DENIED_CODES.contains(&c) => AwsError::AccessDenied { message },
        Some(c) if DEPENDENCY_CODES.contains(&c) => AwsError::DependencyViolation { message },
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Classify an error from an HTTP status alone.
///
/// HEAD requests carry no body, so S3 `HeadBucket` failures arrive with
/// no error code and only a status.
pub fn classify_status(status: u16, message: Option<&str>) -> Option<AwsError> {
    let message = message.unwrap_or("no error body").to_string();
    match status {
        404 => Some(AwsError::NotFound { message }),
        403 => Some(AwsError::AccessDenied { message }),
        _ => None,
    }
}

/// Classify an SDK error using its code, falling back to the HTTP status.
pub fn classify_sdk_error<E>(err: &SdkError<E>) -> AwsError
where
    E: ProvideErrorMetadata,
{
    let meta = ProvideErrorMetadata::meta(err);
    let classified = classify_aws_error(meta.code(), meta.message());
    if let AwsError::Sdk { code: None, .. } = classified {
        let status = err.raw_response().map(|r| r.status().as_u16());
        if let Some(by_status) = status.and_then(|s| classify_status(s, meta.message())) {
            return by_status;
        }
    }
    classified
}

/// Turn the result of a get/head call into a [`Probe`].
///
/// Not-found and access-denied become probe variants; anything else is a
/// real failure and is returned as an error.
pub fn probe_result<T, E>(result: Result<T, SdkError<E>>) -> Result<Probe<T>, SdkError<E>>
where
    E: ProvideErrorMetadata,
{
    match result {
        Ok(v) => Ok(Probe::Found(v)),
        Err(err) => match classify_sdk_error(&err) {
            AwsError::NotFound { .. } => Ok(Probe::NotFound),
            AwsError::AccessDenied { message } => Ok(Probe::Denied(message)),
            _ => Err(err),
        },
    }
}

/// Check whether an SDK error means "not found".
pub fn is_not_found<E>(err: &SdkError<E>) -> bool
where
    E: ProvideErrorMetadata,
{
    classify_sdk_error(err).is_not_found()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        for code in NOT_FOUND_CODES {
            let err = classify_aws_error(Some(code), Some("test"));
            assert!(err.is_not_found(), "Expected NotFound for {}", code);
        }
    }

    #[test]
    fn test_classify_access_denied() {
        for code in ACCESS_DENIED_CODES {
            let err = classify_aws_error(Some(code), Some("test"));
            assert!(err.is_access_denied(), "Expected AccessDenied for {}", code);
        }
    }

    #[test]
    fn test_bucket_owned_by_someone_else_is_denied() {
        assert!(classify_aws_error(Some("BucketAlreadyExists"), None).is_access_denied());
        assert!(matches!(
            classify_aws_error(Some("BucketAlreadyOwnedByYou"), None),
            AwsError::Sdk { .. }
        ));
    }

    #[test]
    fn test_classify_unknown() {
        let err = classify_aws_error(Some("SomethingElse"), Some("boom"));
        match err {
            AwsError::Sdk { code, message } => {
                assert_eq!(code.as_deref(), Some("SomethingElse"));
                assert_eq!(message, "boom");
            }
            other => panic!("Expected Sdk, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(404, None).is_some_and(|e| e.is_not_found()));
        assert!(classify_status(403, None).is_some_and(|e| e.is_access_denied()));
        assert!(classify_status(500, None).is_none());
    }
}
