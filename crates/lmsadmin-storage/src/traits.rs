//! Storage abstraction trait
//!
//! This module defines the [`StorageClient`] trait: the handful of hosted object-storage
//! calls the resolver needs, bound to one project endpoint and one credential.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Failed to decode storage response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One row of a directory listing as reported by the backend.
///
/// `metadata` is present for stored objects and absent for folders. A restricted credential
/// may receive metadata without a `size` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl ObjectEntry {
    pub fn is_file(&self) -> bool {
        self.metadata.is_some()
    }

    pub fn size(&self) -> Option<u64> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("size"))
            .and_then(|s| s.as_u64())
    }

    pub fn mimetype(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("mimetype"))
            .and_then(|s| s.as_str())
    }
}

/// Pagination window for a directory listing. Results are always sorted by name ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: usize,
    pub offset: usize,
}

impl ListOptions {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: String,
    pub cache_control_secs: u32,
    pub upsert: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            content_type: "application/octet-stream".to_string(),
            cache_control_secs: 3600,
            upsert: false,
        }
    }
}

/// Bucket as reported by the backend's bucket listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct BucketInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Hosted object-storage calls, bound to one project and one credential.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// List the direct children of `prefix` in `bucket`, sorted by name ascending.
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        options: ListOptions,
    ) -> StorageResult<Vec<ObjectEntry>>;

    /// Store `data` at `path`.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> StorageResult<()>;

    /// Remove the given object paths in one call. Returns how many objects the backend
    /// reported as removed.
    async fn remove(&self, bucket: &str, paths: &[String]) -> StorageResult<usize>;

    /// List all buckets of the project. Usually requires the service credential.
    async fn list_buckets(&self) -> StorageResult<Vec<BucketInfo>>;

    /// Base URL of the project this client talks to.
    fn endpoint(&self) -> &str;
}
