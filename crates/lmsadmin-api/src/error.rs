//! Rendering of [`AppError`] as JSON error responses.
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Domain errors from the storage
//! crate and the identity client convert into `HttpAppError` directly, so `?` works on them.

use crate::services::identity::IdentityError;
use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lmsadmin_core::{AppError, ErrorMetadata, LogLevel};
use lmsadmin_storage::{DeletionError, ListingError, ResolverError, StorageError, UsageError};
use serde::{de::DeserializeOwned, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Stable code such as `TENANT_NOT_CONFIGURED`.
    pub code: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// `AppError` lives in `lmsadmin-core`, so `IntoResponse` is implemented on this local wrapper.
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

/// Malformed JSON bodies are validation errors.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::Validation(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

/// `Json<T>` whose rejection renders as a 400 [`ErrorResponse`].
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    ["ENVIRONMENT", "APP_ENV"]
        .iter()
        .find_map(|key| std::env::var(key).ok())
        .is_some_and(|env| matches!(env.to_lowercase().as_str(), "production" | "prod"))
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;
        let is_production = is_production_env();

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        // Details only outside production and only for non-sensitive errors.
        let (details, error_type) = if is_production || app_error.is_sensitive() {
            (None, None)
        } else {
            (
                Some(app_error.detailed_message()),
                Some(app_error.error_type().to_string()),
            )
        };

        let body = Json(ErrorResponse {
            error: app_error.client_message(),
            details,
            error_type,
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        });

        (status, body).into_response()
    }
}

// Domain errors to HttpAppError (avoids orphan rule: we impl for local HttpAppError)

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<ResolverError> for HttpAppError {
    fn from(err: ResolverError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<ListingError> for HttpAppError {
    fn from(err: ListingError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<UsageError> for HttpAppError {
    fn from(err: UsageError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<DeletionError> for HttpAppError {
    fn from(err: DeletionError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<IdentityError> for HttpAppError {
    fn from(err: IdentityError) -> Self {
        HttpAppError(AppError::Upstream(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmsadmin_core::Privilege;

    #[test]
    fn test_from_resolver_error_names_missing_key() {
        let err = ResolverError::TenantNotConfigured {
            tenant: "DQW".to_string(),
            privilege: Privilege::Anon,
            missing_key: "SUPABASE_ANON_KEY_DQW".to_string(),
        };
        let HttpAppError(app_err) = err.into();
        match app_err {
            AppError::TenantNotConfigured { missing_key, .. } => {
                assert_eq!(missing_key, "SUPABASE_ANON_KEY_DQW")
            }
            _ => panic!("Expected TenantNotConfigured variant"),
        }
    }

    #[test]
    fn test_from_storage_error_is_upstream() {
        let err = StorageError::Backend {
            status: 409,
            message: "The resource already exists".to_string(),
        };
        let HttpAppError(app_err) = err.into();
        assert_eq!(app_err.http_status_code(), 500);
        assert!(app_err.client_message().contains("already exists"));
    }

    #[test]
    fn test_validation_error_is_bad_request() {
        let response = HttpAppError(AppError::Validation("bucket required".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_response_omits_empty_details() {
        let response = ErrorResponse {
            error: "Bucket not found".to_string(),
            details: None,
            error_type: None,
            code: "UPSTREAM_ERROR".to_string(),
            recoverable: true,
            suggested_action: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json.get("error").and_then(|v| v.as_str()), Some("Bucket not found"));
        assert_eq!(json.get("recoverable").and_then(|v| v.as_bool()), Some(true));
        assert!(json.get("details").is_none());
    }
}
