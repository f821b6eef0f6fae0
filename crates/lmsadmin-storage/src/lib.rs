//! LMS Admin Storage Library
//!
//! Multi-tenant access to the hosted object storage of every tenant project.
//!
//! A request names a bucket (and optionally an account). The [`TenantResolver`] maps it to a
//! project endpoint and credential tier, the [`TreeWalker`] enumerates the virtual folder
//! tree below a path, and the purpose-specific consumers fold over that walk:
//!
//! - [`UsageService`] sums object sizes, escalating to the service credential when the
//!   restricted listing hides sizes.
//! - [`DeletionPlanner`] flattens a folder into object paths and removes them, falling back
//!   to other tenants' service credentials when the primary removal fails.
//! - [`discovery`] derives the usable buckets from configuration alone.
//!
//! # Paths
//!
//! Folders are not stored objects; they only exist as listing artifacts. Object paths are
//! `parent/name` (or `name` at the bucket root) and never start or end with `/`.

pub mod deletion;
pub mod discovery;
pub mod error;
pub mod factory;
pub mod resolver;
pub mod supabase;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod traits;
pub mod usage;
pub mod walker;

// Re-export commonly used types
pub use deletion::{DeleteKind, DeletionError, DeletionOutcome, DeletionPlan, DeletionPlanner, RemovalError};
pub use discovery::list_available;
pub use factory::{create_client_factory, ClientFactory, HttpClientFactory};
pub use resolver::{ResolvedClient, ResolverError, TenantResolver};
pub use supabase::SupabaseStorage;
pub use traits::{
    BucketInfo, ListOptions, ObjectEntry, StorageClient, StorageError, StorageResult,
    UploadOptions,
};
pub use usage::{aggregate, Aggregate, UsageError, UsageReport, UsageService};
pub use walker::{ListingError, ListingResult, StorageEntry, TreeWalk, TreeWalker, DEFAULT_PAGE_SIZE};
