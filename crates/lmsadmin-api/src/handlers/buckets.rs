use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{extract::State, Json};
use lmsadmin_storage::{list_available, BucketInfo};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

/// A bucket derived from tenant configuration.
#[derive(Debug, Serialize, ToSchema)]
pub struct AvailableBucket {
    pub id: String,
    pub name: String,
    pub public: bool,
    pub created_at: Option<String>,
    /// Tenant code that owns the bucket.
    #[serde(rename = "_account")]
    pub account: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AvailableBucketsResponse {
    pub buckets: Vec<AvailableBucket>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BucketsResponse {
    pub buckets: Vec<BucketInfo>,
}

#[utoipa::path(
    get,
    path = "/api/storage/buckets-all",
    tag = "storage",
    responses(
        (status = 200, description = "Default bucket of every usable tenant", body = AvailableBucketsResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn list_available_buckets(
    State(state): State<Arc<AppState>>,
) -> Json<AvailableBucketsResponse> {
    let buckets = list_available(&state.config)
        .into_iter()
        .map(|b| AvailableBucket {
            id: b.bucket_name.clone(),
            name: b.bucket_name,
            public: true,
            created_at: None,
            account: b.tenant.to_string(),
        })
        .collect();

    Json(AvailableBucketsResponse { buckets })
}

#[utoipa::path(
    get,
    path = "/api/storage/buckets",
    tag = "storage",
    responses(
        (status = 200, description = "Buckets of the default admin project", body = BucketsResponse),
        (status = 500, description = "Admin project not configured or backend failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn list_buckets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BucketsResponse>, HttpAppError> {
    let client = state.admin_storage()?;
    let buckets = client.list_buckets().await?;
    tracing::debug!(count = buckets.len(), "Listed admin project buckets");
    Ok(Json(BucketsResponse { buckets }))
}
