pub mod buckets;
pub mod delete;
pub mod files;
pub mod health;
pub mod upload;
pub mod usage;
pub mod users;

use lmsadmin_core::{AppError, BucketRef};

/// Trimmed, non-empty value of an optional parameter.
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// The bucket a request targets: the explicit bucket, else the account's default bucket.
pub(crate) fn target_bucket(
    bucket: Option<&str>,
    account: Option<&str>,
) -> Result<String, AppError> {
    if let Some(bucket) = non_empty(bucket) {
        return Ok(bucket.to_string());
    }
    non_empty(account)
        .and_then(BucketRef::for_account)
        .map(|b| b.bucket_name)
        .ok_or_else(|| AppError::Validation("Bucket name is required".to_string()))
}
