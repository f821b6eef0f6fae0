//! Route configuration and setup

use crate::handlers;
use crate::middleware::request_id_middleware;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use lmsadmin_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Server-level concurrency limit; every request may fan out into many backend calls.
const HTTP_CONCURRENCY_LIMIT: usize = 256;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .merge(storage_routes(config))
        .merge(user_routes())
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };
    Ok(cors)
}

/// Storage routes: discovery, listing, usage, deletion and upload
fn storage_routes(config: &Config) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/storage/buckets-all",
            get(handlers::buckets::list_available_buckets),
        )
        .route("/api/storage/buckets", get(handlers::buckets::list_buckets))
        .route("/api/storage/files", get(handlers::files::list_files))
        .route("/api/storage/usage", get(handlers::usage::bucket_usage))
        .route("/api/storage/usage-debug", get(handlers::usage::usage_debug))
        .route("/api/storage/delete", post(handlers::delete::delete_objects))
        .route(
            "/api/storage/upload",
            post(handlers::upload::upload_file)
                .layer::<_, std::convert::Infallible>(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(config.max_upload_size_bytes())),
        )
}

/// User administration routes on the default admin project
fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users/bulk-insert", post(handlers::users::bulk_insert))
        .route(
            "/api/users/reset-password",
            post(handlers::users::reset_password),
        )
        .route("/api/users/update-role", post(handlers::users::update_role))
}
