use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::{non_empty, target_bucket};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use lmsadmin_core::{AppError, Privilege};
use lmsadmin_storage::{ListOptions, ListingError, ObjectEntry, StorageClient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use utoipa::{IntoParams, ToSchema};

/// Header carrying the diagnostic secret. The `secret` query parameter is accepted too.
pub const DEBUG_SECRET_HEADER: &str = "x-usage-debug-secret";

const DEFAULT_DEBUG_LIMIT: usize = 50;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UsageQuery {
    pub bucket: Option<String>,
    pub account: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub used_bytes: u64,
    /// Deployment quota.
    pub total_bytes: u64,
    /// Credential tier that produced `usedBytes`.
    pub source: Privilege,
    /// True when some objects did not report a size.
    pub incomplete: bool,
}

#[utoipa::path(
    get,
    path = "/api/storage/usage",
    tag = "storage",
    params(UsageQuery),
    responses(
        (status = 200, description = "Total stored bytes of the bucket", body = UsageResponse),
        (status = 400, description = "Bucket missing", body = ErrorResponse),
        (status = 500, description = "Tenant not configured or listing failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "bucket_usage"))]
pub async fn bucket_usage(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<UsageResponse>, HttpAppError> {
    let bucket = target_bucket(query.bucket.as_deref(), query.account.as_deref())?;
    let report = state.usage.usage(&bucket, query.account.as_deref()).await?;

    Ok(Json(UsageResponse {
        used_bytes: report.used_bytes,
        total_bytes: state.config.quota_bytes(),
        source: report.source,
        incomplete: !report.complete,
    }))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UsageDebugQuery {
    pub bucket: Option<String>,
    #[serde(default)]
    pub path: String,
    /// Maximum entries returned; defaults to 50.
    pub limit: Option<usize>,
    pub secret: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsageDebugResponse {
    /// Raw listing rows exactly as the backend returned them.
    #[schema(value_type = Vec<Object>)]
    pub entries: Vec<ObjectEntry>,
    pub source: Privilege,
}

/// Single raw listing page, for diagnosing missing sizes.
#[utoipa::path(
    get,
    path = "/api/storage/usage-debug",
    tag = "storage",
    params(
        UsageDebugQuery,
        ("x-usage-debug-secret" = Option<String>, Header, description = "Diagnostic secret")
    ),
    responses(
        (status = 200, description = "One page of raw entries", body = UsageDebugResponse),
        (status = 400, description = "Bucket missing", body = ErrorResponse),
        (status = 403, description = "Secret missing or wrong", body = ErrorResponse),
        (status = 500, description = "Listing failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, headers, query), fields(bucket = ?query.bucket, path = %query.path))]
pub async fn usage_debug(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<UsageDebugQuery>,
) -> Result<Json<UsageDebugResponse>, HttpAppError> {
    let presented = headers
        .get(DEBUG_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .or(query.secret.as_deref());
    if !secret_matches(state.config.usage_debug_secret(), presented) {
        return Err(AppError::Forbidden("Forbidden".to_string()).into());
    }

    let bucket = non_empty(query.bucket.as_deref())
        .ok_or_else(|| AppError::Validation("bucket required".to_string()))?;
    let limit = query.limit.unwrap_or(DEFAULT_DEBUG_LIMIT).max(1);

    // The bucket's own tenant at its lowest tier, else the admin project's service key.
    let (client, source): (Arc<dyn StorageClient>, Privilege) =
        match state.resolver.resolve_lowest(bucket, None) {
            Ok(resolved) => (resolved.client, resolved.privilege),
            Err(e) => {
                tracing::debug!(error = %e, "No tenant client for bucket, using admin project");
                (state.admin_storage()?, Privilege::Service)
            }
        };

    let path = query.path.trim_matches('/');
    let entries = client
        .list(bucket, path, ListOptions::new(limit, 0))
        .await
        .map_err(|source| ListingError {
            bucket: bucket.to_string(),
            path: path.to_string(),
            source,
        })?;

    Ok(Json(UsageDebugResponse { entries, source }))
}

/// Constant-time comparison; an unset expected secret never matches.
fn secret_matches(expected: Option<&str>, presented: Option<&str>) -> bool {
    match (expected, presented) {
        (Some(expected), Some(presented)) => {
            expected.as_bytes().ct_eq(presented.as_bytes()).into()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_matches() {
        assert!(secret_matches(Some("s3cret"), Some("s3cret")));
        assert!(!secret_matches(Some("s3cret"), Some("s3cre")));
        assert!(!secret_matches(Some("s3cret"), None));
        assert!(!secret_matches(None, Some("")));
        assert!(!secret_matches(None, None));
    }
}
