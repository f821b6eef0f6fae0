use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::target_bucket;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use lmsadmin_storage::{StorageEntry, TreeWalker};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FilesQuery {
    /// Bucket to list. Defaults to `<ACCOUNT>-LMS` when only `account` is given.
    pub bucket: Option<String>,
    /// Tenant code; overrides the tenant inferred from the bucket name.
    pub account: Option<String>,
    /// Directory to list; the bucket root when absent.
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FilesResponse {
    pub files: Vec<StorageEntry>,
}

/// Direct children of one directory. Not recursive.
#[utoipa::path(
    get,
    path = "/api/storage/files",
    tag = "storage",
    params(FilesQuery),
    responses(
        (status = 200, description = "Entries of the directory", body = FilesResponse),
        (status = 400, description = "Bucket missing", body = ErrorResponse),
        (status = 500, description = "Tenant not configured or listing failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "list_files"))]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FilesQuery>,
) -> Result<Json<FilesResponse>, HttpAppError> {
    let bucket = target_bucket(query.bucket.as_deref(), query.account.as_deref())?;
    let resolved = state
        .resolver
        .resolve_highest(&bucket, query.account.as_deref())?;

    let walker = TreeWalker::new(resolved.client, bucket)
        .with_page_size(state.config.listing_page_size());
    let files = walker.list_directory(&query.path).await?;

    tracing::debug!(
        entries = files.len(),
        privilege = %resolved.privilege,
        "Listed directory"
    );
    Ok(Json(FilesResponse { files }))
}
