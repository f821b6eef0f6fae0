//! Conversions from storage failures into [`AppError`].

use crate::deletion::{DeletionError, RemovalError};
use crate::resolver::ResolverError;
use crate::traits::StorageError;
use crate::usage::UsageError;
use crate::walker::ListingError;
use lmsadmin_core::AppError;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl From<ResolverError> for AppError {
    fn from(err: ResolverError) -> Self {
        match err {
            ResolverError::TenantNotConfigured {
                tenant,
                privilege,
                missing_key,
            } => AppError::TenantNotConfigured {
                tenant,
                privilege: privilege.to_string(),
                missing_key,
            },
            ResolverError::Client { .. } => AppError::Upstream(err.to_string()),
        }
    }
}

impl From<ListingError> for AppError {
    fn from(err: ListingError) -> Self {
        AppError::ListingFailed {
            bucket: err.bucket,
            path: err.path,
            message: err.source.to_string(),
        }
    }
}

impl From<RemovalError> for AppError {
    fn from(err: RemovalError) -> Self {
        AppError::RemovalFailed {
            bucket: err.bucket,
            message: err.source.to_string(),
        }
    }
}

impl From<UsageError> for AppError {
    fn from(err: UsageError) -> Self {
        match err {
            UsageError::Resolve(e) => e.into(),
            UsageError::Listing(e) => e.into(),
        }
    }
}

impl From<DeletionError> for AppError {
    fn from(err: DeletionError) -> Self {
        match err {
            DeletionError::Resolve(e) => e.into(),
            DeletionError::Listing(e) => e.into(),
            DeletionError::Removal(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmsadmin_core::{ErrorMetadata, Privilege};

    #[test]
    fn test_not_configured_names_missing_key() {
        let err: AppError = ResolverError::TenantNotConfigured {
            tenant: "RMW".to_string(),
            privilege: Privilege::Service,
            missing_key: "SUPABASE_SERVICE_ROLE_KEY_RMW".to_string(),
        }
        .into();
        assert_eq!(err.http_status_code(), 500);
        assert!(err.client_message().contains("SUPABASE_SERVICE_ROLE_KEY_RMW"));
    }

    #[test]
    fn test_listing_error_keeps_path() {
        let err: AppError = UsageError::Listing(ListingError {
            bucket: "NSG-LMS".to_string(),
            path: "sub".to_string(),
            source: StorageError::Backend {
                status: 403,
                message: "denied".to_string(),
            },
        })
        .into();
        match err {
            AppError::ListingFailed { path, message, .. } => {
                assert_eq!(path, "sub");
                assert!(message.contains("denied"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
