//! Deletion planning and bulk removal.
//!
//! A folder delete is planned by walking the folder in the first candidate bucket that lists
//! (the requested bucket, then the tenant's default `<TENANT>-LMS` bucket). The resulting
//! paths are removed in one call. If that call fails, the same removal is attempted with each
//! other tenant's service credential in enumeration order; a fallback that removes nothing
//! counts as failed. This tolerates buckets mapped to the wrong tenant; it is not an isolation
//! boundary, since any tenant holding the same bucket name and paths will accept the delete.

use crate::resolver::{ResolverError, TenantResolver};
use crate::traits::{StorageClient, StorageError};
use crate::walker::{ListingError, TreeWalker, DEFAULT_PAGE_SIZE};
use futures::TryStreamExt;
use lmsadmin_core::{BucketRef, Privilege, TenantCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Number of deleted paths echoed back to the caller.
const EXAMPLE_PATHS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeleteKind {
    #[default]
    File,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionPlan {
    /// Object paths in walk order.
    pub paths: Vec<String>,
    /// The candidate bucket the plan was produced from.
    pub used_bucket: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionOutcome {
    pub deleted: usize,
    pub used_bucket: String,
    /// Tenant whose service credential performed the removal, when the primary one failed.
    pub fallback_used: Option<TenantCode>,
    pub examples: Vec<String>,
}

#[derive(Debug, Error)]
#[error("removal from {bucket} failed on every attempted tenant: {source}")]
pub struct RemovalError {
    pub bucket: String,
    /// Tenants tried after the primary removal failed.
    pub fallbacks_tried: Vec<TenantCode>,
    /// Failure of the primary removal.
    #[source]
    pub source: StorageError,
}

#[derive(Debug, Error)]
pub enum DeletionError {
    #[error(transparent)]
    Resolve(#[from] ResolverError),

    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error(transparent)]
    Removal(#[from] RemovalError),
}

pub struct DeletionPlanner {
    resolver: Arc<TenantResolver>,
    page_size: usize,
}

impl DeletionPlanner {
    pub fn new(resolver: Arc<TenantResolver>) -> Self {
        Self {
            resolver,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Requested bucket first, then the tenant's default bucket.
    pub fn candidates(bucket: &BucketRef) -> Vec<String> {
        let mut candidates = vec![bucket.bucket_name.clone()];
        let fallback = bucket.tenant.default_bucket();
        if !candidates.contains(&fallback) {
            candidates.push(fallback);
        }
        candidates
    }

    /// Flatten `root` into the object paths to remove.
    ///
    /// A file plan is the path itself and needs no listing. A folder plan walks `root` in the
    /// first candidate whose root listing succeeds; a failure after that point fails the plan
    /// rather than moving on to the next candidate.
    pub async fn plan(
        &self,
        client: Arc<dyn StorageClient>,
        candidates: &[String],
        root: &str,
        kind: DeleteKind,
    ) -> Result<DeletionPlan, ListingError> {
        let root = root.trim_matches('/');
        if kind == DeleteKind::File {
            if let Some(bucket) = candidates.first() {
                return Ok(DeletionPlan {
                    paths: vec![root.to_string()],
                    used_bucket: bucket.clone(),
                });
            }
        }

        let mut last_err = None;
        for candidate in candidates {
            let walker =
                TreeWalker::new(client.clone(), candidate.clone()).with_page_size(self.page_size);
            match walker.open(root).await {
                Ok(walk) => {
                    let paths: Vec<String> =
                        walk.into_stream().map_ok(|e| e.path).try_collect().await?;
                    return Ok(DeletionPlan {
                        paths,
                        used_bucket: candidate.clone(),
                    });
                }
                Err(e) => {
                    tracing::debug!(
                        bucket = %candidate,
                        path = %root,
                        error = %e.source,
                        "Candidate bucket did not list, trying next"
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ListingError {
            bucket: String::new(),
            path: root.to_string(),
            source: StorageError::ConfigError("No candidate bucket to list".to_string()),
        }))
    }

    /// Remove `paths` from `bucket` with `primary`, then with each other tenant's service
    /// credential until one removes something.
    ///
    /// Returns the number of objects the backend reported as removed, and the tenant that
    /// performed the removal when it was not the primary one.
    pub async fn remove(
        &self,
        tenant: &TenantCode,
        primary: &dyn StorageClient,
        bucket: &str,
        paths: &[String],
    ) -> Result<(usize, Option<TenantCode>), RemovalError> {
        let primary_err = match primary.remove(bucket, paths).await {
            Ok(removed) => return Ok((removed, None)),
            Err(e) => e,
        };

        tracing::warn!(
            bucket = %bucket,
            tenant = %tenant,
            error = %primary_err,
            "Primary removal failed, trying other tenants"
        );

        let mut fallbacks_tried = Vec::new();
        for other in self.resolver.tenants() {
            if &other.code == tenant
                || !self.resolver.has_credential(&other.code, Privilege::Service)
            {
                continue;
            }
            let client = match self.resolver.client_for(&other.code, Privilege::Service) {
                Ok(client) => client,
                Err(e) => {
                    tracing::warn!(tenant = %other.code, error = %e, "Skipping fallback tenant");
                    continue;
                }
            };

            fallbacks_tried.push(other.code.clone());
            match client.remove(bucket, paths).await {
                Ok(0) if !paths.is_empty() => {
                    tracing::warn!(
                        bucket = %bucket,
                        fallback = %other.code,
                        "Fallback tenant removed nothing"
                    );
                }
                Ok(removed) => {
                    tracing::warn!(
                        bucket = %bucket,
                        tenant = %tenant,
                        fallback = %other.code,
                        removed,
                        "Removal succeeded through another tenant"
                    );
                    return Ok((removed, Some(other.code.clone())));
                }
                Err(e) => {
                    tracing::warn!(
                        bucket = %bucket,
                        fallback = %other.code,
                        error = %e,
                        "Fallback removal failed"
                    );
                }
            }
        }

        Err(RemovalError {
            bucket: bucket.to_string(),
            fallbacks_tried,
            source: primary_err,
        })
    }

    /// Delete a file or a whole folder of `bucket` using the tenant's service credential.
    pub async fn delete(
        &self,
        bucket: &str,
        account: Option<&str>,
        path: &str,
        kind: DeleteKind,
    ) -> Result<DeletionOutcome, DeletionError> {
        let resolved = self.resolver.resolve(bucket, account, Privilege::Service)?;
        let candidates = Self::candidates(&resolved.bucket);
        let plan = self
            .plan(resolved.client.clone(), &candidates, path, kind)
            .await?;

        if plan.paths.is_empty() {
            tracing::info!(
                bucket = %plan.used_bucket,
                path = %path,
                "Nothing to delete"
            );
            return Ok(DeletionOutcome {
                deleted: 0,
                used_bucket: plan.used_bucket,
                fallback_used: None,
                examples: Vec::new(),
            });
        }

        let (deleted, fallback_used) = self
            .remove(
                &resolved.bucket.tenant,
                resolved.client.as_ref(),
                &plan.used_bucket,
                &plan.paths,
            )
            .await?;

        if deleted < plan.paths.len() {
            tracing::warn!(
                bucket = %plan.used_bucket,
                planned = plan.paths.len(),
                deleted,
                "Backend removed fewer objects than planned"
            );
        }
        tracing::info!(
            bucket = %plan.used_bucket,
            path = %path,
            kind = ?kind,
            deleted,
            fallback = ?fallback_used.as_ref().map(|t| t.as_str()),
            "Objects deleted"
        );

        Ok(DeletionOutcome {
            deleted,
            examples: plan.paths.iter().take(EXAMPLE_PATHS).cloned().collect(),
            used_bucket: plan.used_bucket,
            fallback_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryBackend, TestTenants};

    const BUCKET: &str = "NSG-LMS";

    fn planner(backend: &MemoryBackend, tenants: TestTenants) -> DeletionPlanner {
        let resolver = TenantResolver::new(Arc::new(tenants.build()), Arc::new(backend.factory()));
        DeletionPlanner::new(Arc::new(resolver))
    }

    fn all_tenants() -> TestTenants {
        TestTenants::new()
            .tenant("NSG", true, true)
            .tenant("RMW", true, true)
            .tenant("DQW", true, true)
    }

    #[test]
    fn test_candidates_are_deduplicated() {
        let bucket = BucketRef::infer("NSG-LMS").unwrap();
        assert_eq!(DeletionPlanner::candidates(&bucket), vec!["NSG-LMS"]);

        let bucket = BucketRef::infer("NSG-ARCHIVE").unwrap();
        assert_eq!(
            DeletionPlanner::candidates(&bucket),
            vec!["NSG-ARCHIVE", "NSG-LMS"]
        );
    }

    #[tokio::test]
    async fn test_delete_folder() {
        let backend = MemoryBackend::new();
        let url = TestTenants::base_url("NSG");
        backend.put_object(&url, BUCKET, "reports/q1.pdf", 10);
        backend.put_object(&url, BUCKET, "reports/q2.pdf", 10);
        backend.put_object(&url, BUCKET, "keep.txt", 10);

        let outcome = planner(&backend, all_tenants())
            .delete(BUCKET, None, "reports", DeleteKind::Folder)
            .await
            .unwrap();

        assert_eq!(outcome.deleted, 2);
        assert_eq!(outcome.used_bucket, BUCKET);
        assert_eq!(outcome.fallback_used, None);
        assert_eq!(outcome.examples, vec!["reports/q1.pdf", "reports/q2.pdf"]);
        assert_eq!(backend.object_paths(&url, BUCKET), vec!["keep.txt"]);
        assert_eq!(backend.remove_requests(), 1);
    }

    #[tokio::test]
    async fn test_delete_empty_folder_issues_no_remove() {
        let backend = MemoryBackend::new();
        let url = TestTenants::base_url("NSG");
        backend.put_object(&url, BUCKET, "keep.txt", 10);

        let outcome = planner(&backend, all_tenants())
            .delete(BUCKET, None, "empty", DeleteKind::Folder)
            .await
            .unwrap();

        assert_eq!(outcome.deleted, 0);
        assert_eq!(outcome.used_bucket, BUCKET);
        assert_eq!(backend.remove_requests(), 0);
    }

    #[tokio::test]
    async fn test_delete_file_needs_no_listing() {
        let backend = MemoryBackend::new();
        let url = TestTenants::base_url("NSG");
        backend.put_object(&url, BUCKET, "docs/a.txt", 10);

        let outcome = planner(&backend, all_tenants())
            .delete(BUCKET, None, "/docs/a.txt", DeleteKind::File)
            .await
            .unwrap();

        assert_eq!(outcome.deleted, 1);
        assert_eq!(outcome.examples, vec!["docs/a.txt"]);
        assert_eq!(backend.list_requests(), 0);
        assert!(backend.object(&url, BUCKET, "docs/a.txt").is_none());
    }

    #[tokio::test]
    async fn test_folder_falls_back_to_default_bucket() {
        let backend = MemoryBackend::new();
        let url = TestTenants::base_url("NSG");
        backend.put_object(&url, BUCKET, "reports/q1.pdf", 10);

        let outcome = planner(&backend, all_tenants())
            .delete("NSG-ARCHIVE", None, "reports", DeleteKind::Folder)
            .await
            .unwrap();

        assert_eq!(outcome.used_bucket, BUCKET);
        assert_eq!(outcome.deleted, 1);
    }

    #[tokio::test]
    async fn test_failed_removal_falls_back_to_next_tenant() {
        let backend = MemoryBackend::new();
        let nsg = TestTenants::base_url("NSG");
        let rmw = TestTenants::base_url("RMW");
        for url in [&nsg, &rmw] {
            backend.put_object(url, BUCKET, "reports/q1.pdf", 10);
            backend.put_object(url, BUCKET, "reports/q2.pdf", 10);
        }
        backend.deny_removal(&nsg);

        let outcome = planner(&backend, all_tenants())
            .delete(BUCKET, None, "reports", DeleteKind::Folder)
            .await
            .unwrap();

        assert_eq!(outcome.deleted, 2);
        assert_eq!(outcome.fallback_used.as_ref().map(|t| t.as_str()), Some("RMW"));
        assert_eq!(backend.remove_targets(), vec![nsg, rmw]);
    }

    #[tokio::test]
    async fn test_removal_error_after_all_tenants_fail() {
        let backend = MemoryBackend::new();
        let nsg = TestTenants::base_url("NSG");
        let rmw = TestTenants::base_url("RMW");
        backend.put_object(&nsg, BUCKET, "reports/q1.pdf", 10);
        backend.deny_removal(&nsg);
        backend.deny_removal(&rmw);

        let tenants = TestTenants::new()
            .tenant("NSG", true, true)
            .tenant("RMW", true, true)
            .tenant("DQW", true, false);
        let err = planner(&backend, tenants)
            .delete(BUCKET, None, "reports", DeleteKind::Folder)
            .await
            .unwrap_err();

        match err {
            DeletionError::Removal(e) => {
                assert_eq!(e.bucket, BUCKET);
                let tried: Vec<&str> = e.fallbacks_tried.iter().map(|t| t.as_str()).collect();
                assert_eq!(tried, vec!["RMW"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.remove_targets(), vec![nsg, rmw]);
        assert_eq!(
            backend.object_paths(&TestTenants::base_url("NSG"), BUCKET),
            vec!["reports/q1.pdf"]
        );
    }

    #[tokio::test]
    async fn test_fallback_that_removes_nothing_is_not_success() {
        let backend = MemoryBackend::new();
        let nsg = TestTenants::base_url("NSG");
        let rmw = TestTenants::base_url("RMW");
        let dqw = TestTenants::base_url("DQW");
        backend.put_object(&nsg, BUCKET, "reports/q1.pdf", 10);
        backend.put_object(&nsg, BUCKET, "reports/q2.pdf", 10);
        backend.create_bucket(&rmw, BUCKET);
        backend.create_bucket(&dqw, BUCKET);
        backend.deny_removal(&nsg);

        let err = planner(&backend, all_tenants())
            .delete(BUCKET, None, "reports", DeleteKind::Folder)
            .await
            .unwrap_err();

        match err {
            DeletionError::Removal(e) => {
                let tried: Vec<&str> = e.fallbacks_tried.iter().map(|t| t.as_str()).collect();
                assert_eq!(tried, vec!["RMW", "DQW"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            backend.object_paths(&nsg, BUCKET),
            vec!["reports/q1.pdf", "reports/q2.pdf"]
        );
    }

    #[tokio::test]
    async fn test_fallback_skips_tenant_that_removed_nothing() {
        let backend = MemoryBackend::new();
        let nsg = TestTenants::base_url("NSG");
        let rmw = TestTenants::base_url("RMW");
        let dqw = TestTenants::base_url("DQW");
        backend.put_object(&nsg, BUCKET, "reports/q1.pdf", 10);
        backend.put_object(&nsg, BUCKET, "reports/q2.pdf", 10);
        backend.create_bucket(&rmw, BUCKET);
        backend.put_object(&dqw, BUCKET, "reports/q1.pdf", 10);
        backend.deny_removal(&nsg);

        let outcome = planner(&backend, all_tenants())
            .delete(BUCKET, None, "reports", DeleteKind::Folder)
            .await
            .unwrap();

        assert_eq!(outcome.deleted, 1);
        assert_eq!(outcome.fallback_used.as_ref().map(|t| t.as_str()), Some("DQW"));
        assert_eq!(backend.remove_targets(), vec![nsg, rmw, dqw]);
    }

    #[tokio::test]
    async fn test_deleted_count_comes_from_backend() {
        let backend = MemoryBackend::new();
        let url = TestTenants::base_url("NSG");
        backend.put_object(&url, BUCKET, "docs/other.txt", 10);

        let outcome = planner(&backend, all_tenants())
            .delete(BUCKET, None, "docs/missing.txt", DeleteKind::File)
            .await
            .unwrap();

        assert_eq!(outcome.deleted, 0);
        assert_eq!(outcome.fallback_used, None);
        assert_eq!(backend.remove_requests(), 1);
    }

    #[tokio::test]
    async fn test_listing_failure_is_not_masked_by_later_candidate() {
        let backend = MemoryBackend::new();
        let url = TestTenants::base_url("NSG");
        backend.put_object(&url, "NSG-ARCHIVE", "reports/deep/a.txt", 1);
        backend.put_object(&url, BUCKET, "reports/deep/a.txt", 1);
        backend.fail_listing(&url, "NSG-ARCHIVE", "reports/deep");

        let err = planner(&backend, all_tenants())
            .delete("NSG-ARCHIVE", None, "reports", DeleteKind::Folder)
            .await
            .unwrap_err();

        assert!(matches!(err, DeletionError::Listing(ref e) if e.bucket == "NSG-ARCHIVE"));
        assert_eq!(backend.remove_requests(), 0);
    }

    #[tokio::test]
    async fn test_examples_are_capped() {
        let backend = MemoryBackend::new();
        let url = TestTenants::base_url("NSG");
        for i in 0..8 {
            backend.put_object(&url, BUCKET, &format!("bulk/{}.bin", i), 1);
        }

        let outcome = planner(&backend, all_tenants())
            .delete(BUCKET, None, "bulk", DeleteKind::Folder)
            .await
            .unwrap();

        assert_eq!(outcome.deleted, 8);
        assert_eq!(outcome.examples.len(), 5);
    }

    #[tokio::test]
    async fn test_missing_service_credential() {
        let backend = MemoryBackend::new();
        let tenants = TestTenants::new().tenant("NSG", true, false);

        let err = planner(&backend, tenants)
            .delete(BUCKET, None, "reports", DeleteKind::Folder)
            .await
            .unwrap_err();
        assert!(matches!(err, DeletionError::Resolve(_)));
    }
}
