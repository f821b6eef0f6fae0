//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use crate::services::identity;

/// The OpenAPI document served at `/api/openapi.json`.
pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "LMS Admin API",
        version = "0.1.0",
        description = "Multi-tenant storage and user administration for the LMS admin console"
    ),
    paths(
        handlers::health::health_check,
        handlers::buckets::list_available_buckets,
        handlers::buckets::list_buckets,
        handlers::files::list_files,
        handlers::usage::bucket_usage,
        handlers::usage::usage_debug,
        handlers::delete::delete_objects,
        handlers::upload::upload_file,
        handlers::users::bulk_insert,
        handlers::users::reset_password,
        handlers::users::update_role,
    ),
    components(
        schemas(
            handlers::health::HealthResponse,
            handlers::buckets::AvailableBucket,
            handlers::buckets::AvailableBucketsResponse,
            handlers::buckets::BucketsResponse,
            handlers::files::FilesResponse,
            handlers::usage::UsageResponse,
            handlers::usage::UsageDebugResponse,
            handlers::delete::DeleteRequest,
            handlers::delete::DeleteResponse,
            handlers::upload::UploadResponse,
            handlers::users::BulkInsertRequest,
            handlers::users::BulkInsertResponse,
            handlers::users::RowResult,
            handlers::users::ResetPasswordRequest,
            handlers::users::ResetPasswordResponse,
            handlers::users::UpdateRoleRequest,
            handlers::users::UpdateRoleResponse,
            identity::IdentityUser,
            lmsadmin_storage::StorageEntry,
            lmsadmin_storage::BucketInfo,
            lmsadmin_storage::DeleteKind,
            lmsadmin_core::Privilege,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "storage", description = "Bucket discovery, listing, usage, deletion and upload across tenants"),
        (name = "users", description = "User administration on the default project"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;
