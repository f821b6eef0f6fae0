//! Error types module
//!
//! All failures that reach a caller are expressed as [`AppError`]. Each variant describes its
//! own HTTP presentation through [`ErrorMetadata`], so the API layer never has to guess.

/// Level an error is logged at when it reaches the HTTP edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Caller mistakes.
    Debug,
    /// Denied requests and misconfiguration.
    Warn,
    /// Backend and internal failures.
    Error,
}

/// How an error is presented to API clients.
pub trait ErrorMetadata {
    fn http_status_code(&self) -> u16;

    /// Stable code clients can match on, e.g. `LISTING_FAILED`.
    fn error_code(&self) -> &'static str;

    /// True when retrying the same request may succeed.
    fn is_recoverable(&self) -> bool;

    fn suggested_action(&self) -> Option<&'static str>;

    /// Text for the `error` field of the response body.
    fn client_message(&self) -> String;

    /// Sensitive errors never expose `details`.
    fn is_sensitive(&self) -> bool;

    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Storage configuration missing for tenant {tenant} ({privilege} credential). Add {missing_key} to the environment.")]
    TenantNotConfigured {
        tenant: String,
        privilege: String,
        missing_key: String,
    },

    #[error("Listing failed for {bucket}:{path}: {message}")]
    ListingFailed {
        bucket: String,
        path: String,
        message: String,
    },

    #[error("Removal failed for {bucket}: {message}")]
    RemovalFailed { bucket: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON parsing error: {}", err))
    }
}

/// (status, code, recoverable, suggested action, sensitive, log level) per variant.
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::TenantNotConfigured { .. } => (
            500,
            "TENANT_NOT_CONFIGURED",
            false,
            Some("Add the missing configuration key and restart the service"),
            false,
            LogLevel::Error,
        ),
        AppError::ListingFailed { .. } => (
            500,
            "LISTING_FAILED",
            true,
            Some("Retry after a short delay"),
            false,
            LogLevel::Error,
        ),
        AppError::RemovalFailed { .. } => (
            500,
            "REMOVAL_FAILED",
            true,
            Some("Check the bucket credentials and retry"),
            false,
            LogLevel::Error,
        ),
        AppError::Validation(_) => (
            400,
            "VALIDATION_ERROR",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Forbidden(_) => (403, "FORBIDDEN", false, None, false, LogLevel::Warn),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Upstream(_) => (
            500,
            "UPSTREAM_ERROR",
            true,
            Some("Retry after a short delay"),
            false,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Variant name, shown as `error_type` outside production.
    pub fn error_type(&self) -> &str {
        match self {
            AppError::TenantNotConfigured { .. } => "TenantNotConfigured",
            AppError::ListingFailed { .. } => "ListingFailed",
            AppError::RemovalFailed { .. } => "RemovalFailed",
            AppError::Validation(_) => "ValidationError",
            AppError::Forbidden(_) => "Forbidden",
            AppError::NotFound(_) => "NotFound",
            AppError::Upstream(_) => "Upstream",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Display text followed by up to five `Caused by:` lines.
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::TenantNotConfigured { .. } => self.to_string(),
            AppError::ListingFailed { path, message, .. } => {
                format!("Failed to list '{}': {}", path, message)
            }
            AppError::RemovalFailed { message, .. } => message.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::Forbidden(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Upstream(msg) => msg.clone(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
