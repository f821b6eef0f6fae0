//! Bucket usage aggregation.

use crate::resolver::{ResolvedClient, ResolverError, TenantResolver};
use crate::walker::{ListingError, StorageEntry, TreeWalker, DEFAULT_PAGE_SIZE};
use futures::{Stream, TryStreamExt};
use lmsadmin_core::{Privilege, TenantCode};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UsageError {
    #[error(transparent)]
    Resolve(#[from] ResolverError),

    #[error(transparent)]
    Listing(#[from] ListingError),
}

/// Folded totals of one walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregate {
    pub used_bytes: u64,
    pub files: u64,
    /// False when at least one file was listed without a size.
    pub complete: bool,
}

impl Default for Aggregate {
    fn default() -> Self {
        Self {
            used_bytes: 0,
            files: 0,
            complete: true,
        }
    }
}

impl Aggregate {
    fn add(mut self, entry: &StorageEntry) -> Self {
        if !entry.is_file {
            return self;
        }
        self.files += 1;
        match entry.size_bytes {
            Some(size) => self.used_bytes += size,
            None => self.complete = false,
        }
        self
    }

    /// Whether a restricted listing probably hid sizes.
    pub fn needs_escalation(&self) -> bool {
        !self.complete || (self.used_bytes == 0 && self.files > 0)
    }
}

/// Sum the sizes of every file in `entries`. Fails with the first listing error.
pub async fn aggregate<S>(entries: S) -> Result<Aggregate, ListingError>
where
    S: Stream<Item = Result<StorageEntry, ListingError>>,
{
    entries
        .try_fold(Aggregate::default(), |acc, entry| async move {
            Ok(acc.add(&entry))
        })
        .await
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageReport {
    pub bucket: String,
    pub tenant: TenantCode,
    pub used_bytes: u64,
    pub files: u64,
    pub complete: bool,
    /// Credential tier that produced the reported totals.
    pub source: Privilege,
}

pub struct UsageService {
    resolver: Arc<TenantResolver>,
    page_size: usize,
}

impl UsageService {
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

    async fn run(&self, resolved: &ResolvedClient) -> Result<Aggregate, ListingError> {
        let walker = TreeWalker::new(resolved.client.clone(), resolved.bucket.bucket_name.clone())
            .with_page_size(self.page_size);
        aggregate(walker.walk("")).await
    }

    /// Total stored bytes of `bucket`.
    ///
    /// The first pass uses the lowest configured credential tier. When that pass was anon and
    /// reports missing sizes (or zero bytes across a non-empty tree), the whole walk is repeated
    /// once with the service credential, if the tenant has one. A failed retry is reported as
    /// the error; it does not fall back to the first pass.
    pub async fn usage(
        &self,
        bucket: &str,
        account: Option<&str>,
    ) -> Result<UsageReport, UsageError> {
        let first = self.resolver.resolve_lowest(bucket, account)?;
        let mut totals = self.run(&first).await?;
        let mut resolved = first;

        if resolved.privilege == Privilege::Anon
            && totals.needs_escalation()
            && self
                .resolver
                .has_credential(&resolved.bucket.tenant, Privilege::Service)
        {
            tracing::info!(
                bucket = %resolved.bucket.bucket_name,
                tenant = %resolved.bucket.tenant,
                files = totals.files,
                used_bytes = totals.used_bytes,
                complete = totals.complete,
                "Anon listing hid object sizes, retrying with service credential"
            );
            let service = self.resolver.resolve(bucket, account, Privilege::Service)?;
            totals = self.run(&service).await?;
            resolved = service;
        }

        tracing::debug!(
            bucket = %resolved.bucket.bucket_name,
            tenant = %resolved.bucket.tenant,
            used_bytes = totals.used_bytes,
            files = totals.files,
            source = %resolved.privilege,
            "Bucket usage computed"
        );

        Ok(UsageReport {
            bucket: resolved.bucket.bucket_name,
            tenant: resolved.bucket.tenant,
            used_bytes: totals.used_bytes,
            files: totals.files,
            complete: totals.complete,
            source: resolved.privilege,
        })
    }
}
