use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::non_empty;
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use lmsadmin_core::{AppError, BucketRef, Privilege};
use lmsadmin_storage::UploadOptions;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
}

#[derive(Default)]
struct UploadForm {
    bucket: Option<String>,
    account: Option<String>,
    path: Option<String>,
    file: Option<UploadedFile>,
}

struct UploadedFile {
    file_name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().map(String::from);
                let content_type = field.content_type().map(String::from);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file: {}", e)))?;
                form.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    data,
                });
            }
            "bucket" | "account" | "path" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid field {}: {}", name, e)))?;
                match name.as_str() {
                    "bucket" => form.bucket = Some(value),
                    "account" => form.account = Some(value),
                    _ => form.path = Some(value),
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

#[utoipa::path(
    post,
    path = "/api/storage/upload",
    tag = "storage",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "Bucket, file or path missing", body = ErrorResponse),
        (status = 413, description = "File too large"),
        (status = 500, description = "Tenant not configured or backend failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_file"))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let form = read_form(multipart).await?;

    let account = non_empty(form.account.as_deref());
    let bucket = match account.and_then(BucketRef::for_account) {
        Some(default_bucket) => default_bucket.bucket_name,
        None => non_empty(form.bucket.as_deref())
            .map(String::from)
            .ok_or_else(|| AppError::Validation("Missing bucket or file".to_string()))?,
    };
    let file = form
        .file
        .ok_or_else(|| AppError::Validation("Missing bucket or file".to_string()))?;

    let upload_path = non_empty(form.path.as_deref())
        .map(String::from)
        .or(file.file_name)
        .unwrap_or_default()
        .trim_start_matches('/')
        .to_string();
    if upload_path.is_empty() {
        return Err(AppError::Validation("Upload path is required".to_string()).into());
    }

    let resolved = state.resolver.resolve(&bucket, account, Privilege::Anon)?;
    let options = UploadOptions {
        content_type: file
            .content_type
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| UploadOptions::default().content_type),
        ..UploadOptions::default()
    };

    tracing::info!(
        bucket = %bucket,
        tenant = %resolved.bucket.tenant,
        path = %upload_path,
        content_type = %options.content_type,
        size_bytes = file.data.len(),
        "Uploading file"
    );
    resolved
        .client
        .upload(&bucket, &upload_path, file.data, &options)
        .await?;

    Ok(Json(UploadResponse { success: true }))
}
