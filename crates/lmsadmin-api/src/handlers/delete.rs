use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::non_empty;
use crate::state::AppState;
use axum::{extract::State, Json};
use lmsadmin_core::AppError;
use lmsadmin_storage::DeleteKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteRequest {
    pub bucket: Option<String>,
    /// Object path, or folder path when `type` is `folder`.
    pub path: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: DeleteKind,
    /// Tenant code; overrides the tenant inferred from the bucket name.
    pub account: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted: usize,
    pub used_bucket: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
    /// Tenant whose service credential performed the removal after the primary one failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/storage/delete",
    tag = "storage",
    request_body = DeleteRequest,
    responses(
        (status = 200, description = "Objects removed", body = DeleteResponse),
        (status = 400, description = "Bucket or path missing", body = ErrorResponse),
        (status = 500, description = "Tenant not configured, listing or removal failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(operation = "delete_objects"))]
pub async fn delete_objects(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<DeleteRequest>,
) -> Result<Json<DeleteResponse>, HttpAppError> {
    let (Some(bucket), Some(path)) = (
        non_empty(request.bucket.as_deref()),
        non_empty(request.path.as_deref().map(|p| p.trim_matches('/'))),
    ) else {
        return Err(AppError::Validation("Bucket and path are required".to_string()).into());
    };

    let outcome = state
        .deletion
        .delete(bucket, request.account.as_deref(), path, request.kind)
        .await?;

    let message = (outcome.deleted == 0).then(|| "Nothing to delete".to_string());
    Ok(Json(DeleteResponse {
        success: true,
        deleted: outcome.deleted,
        used_bucket: outcome.used_bucket,
        examples: outcome.examples,
        fallback_used: outcome.fallback_used.map(|t| t.to_string()),
        message,
    }))
}
