//! Recursive listing engine.
//!
//! [`TreeWalker`] enumerates every stored object below a path, depth-first: the entries of a
//! directory are visited in name order and a subdirectory is fully walked before its next
//! sibling. Each directory is paged with `page_size` entries per request; the walk asks for
//! one extra row so a directory of exactly `page_size` entries costs a single request.
//!
//! The walk is lazy. [`TreeWalk::into_stream`] yields files as they are discovered and stops
//! at the first failed page request, so no partial result is ever reported as complete.

use crate::traits::{ListOptions, ObjectEntry, StorageClient, StorageError};
use futures::{Stream, TryStreamExt};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// A page request failed. Carries the directory whose listing failed.
#[derive(Debug, Error)]
#[error("listing {bucket}:/{path} failed: {source}")]
pub struct ListingError {
    pub bucket: String,
    pub path: String,
    #[source]
    pub source: StorageError,
}

/// One node of a bucket's object tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageEntry {
    pub name: String,
    /// Full object path from the bucket root.
    pub path: String,
    /// True when the backend reported object metadata; false for folders.
    pub is_file: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl StorageEntry {
    fn from_object(entry: ObjectEntry, path: String) -> Self {
        Self {
            is_file: entry.is_file(),
            size_bytes: entry.size(),
            mimetype: entry.mimetype().map(String::from),
            updated_at: entry.updated_at,
            name: entry.name,
            path,
        }
    }
}

/// Every file below a path plus whether all of them reported a size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingResult {
    pub entries: Vec<StorageEntry>,
    pub complete: bool,
}

/// `parent/name`, or `name` at the root.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

fn normalize_path(path: &str) -> String {
    path.trim_matches('/').to_string()
}

struct Page {
    entries: Vec<ObjectEntry>,
    has_more: bool,
}

#[derive(Clone)]
pub struct TreeWalker {
    client: Arc<dyn StorageClient>,
    bucket: String,
    page_size: usize,
}

impl TreeWalker {
    pub fn new(client: Arc<dyn StorageClient>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn fetch_page(&self, path: &str, offset: usize) -> Result<Page, ListingError> {
        let options = ListOptions::new(self.page_size + 1, offset);
        let mut entries = self
            .client
            .list(&self.bucket, path, options)
            .await
            .map_err(|source| ListingError {
                bucket: self.bucket.clone(),
                path: path.to_string(),
                source,
            })?;

        let has_more = entries.len() > self.page_size;
        entries.truncate(self.page_size);
        Ok(Page { entries, has_more })
    }

    /// All direct children of `path` (files and folders), following every page.
    pub async fn list_directory(&self, path: &str) -> Result<Vec<StorageEntry>, ListingError> {
        let path = normalize_path(path);
        let mut entries = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.fetch_page(&path, offset).await?;
            offset += page.entries.len();
            entries.extend(
                page.entries
                    .into_iter()
                    .map(|e| {
                        let full = join_path(&path, &e.name);
                        StorageEntry::from_object(e, full)
                    }),
            );
            if !page.has_more {
                return Ok(entries);
            }
        }
    }

    /// Start a walk at `root`. The first page of `root` is requested here, so a bucket or
    /// credential that cannot list at all fails before any entry is produced.
    pub async fn open(self, root: &str) -> Result<TreeWalk, ListingError> {
        let root = normalize_path(root);
        let page = self.fetch_page(&root, 0).await?;
        let mut cursor = DirCursor::new(root);
        cursor.absorb(page);
        Ok(TreeWalk {
            walker: self,
            stack: vec![cursor],
        })
    }

    /// Lazily walk every file below `root`.
    pub fn walk(
        self,
        root: &str,
    ) -> impl Stream<Item = Result<StorageEntry, ListingError>> + Send + 'static {
        let root = root.to_string();
        futures::stream::once(async move { self.open(&root).await })
            .map_ok(TreeWalk::into_stream)
            .try_flatten()
    }
}

struct DirCursor {
    path: String,
    next_offset: usize,
    pending: VecDeque<ObjectEntry>,
    has_more: bool,
}

impl DirCursor {
    fn new(path: String) -> Self {
        Self {
            path,
            next_offset: 0,
            pending: VecDeque::new(),
            has_more: true,
        }
    }

    fn absorb(&mut self, page: Page) {
        self.next_offset += page.entries.len();
        self.has_more = page.has_more;
        self.pending.extend(page.entries);
    }
}

/// An open depth-first walk.
pub struct TreeWalk {
    walker: TreeWalker,
    stack: Vec<DirCursor>,
}

impl TreeWalk {
    pub fn bucket(&self) -> &str {
        self.walker.bucket()
    }

    /// The next file in depth-first order, or `None` once the tree is exhausted.
    pub async fn next_entry(&mut self) -> Result<Option<StorageEntry>, ListingError> {
        loop {
            let Some(top) = self.stack.last_mut() else {
                return Ok(None);
            };

            if let Some(entry) = top.pending.pop_front() {
                let path = join_path(&top.path, &entry.name);
                if entry.is_file() {
                    return Ok(Some(StorageEntry::from_object(entry, path)));
                }
                let page = self.walker.fetch_page(&path, 0).await?;
                let mut child = DirCursor::new(path);
                child.absorb(page);
                self.stack.push(child);
                continue;
            }

            if top.has_more {
                let page = self.walker.fetch_page(&top.path, top.next_offset).await?;
                top.absorb(page);
                continue;
            }

            self.stack.pop();
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<StorageEntry, ListingError>> + Send + 'static {
        futures::stream::try_unfold(self, |mut walk| async move {
            let next = walk.next_entry().await?;
            Ok(next.map(|entry| (entry, walk)))
        })
    }

    /// Drain the walk into a [`ListingResult`].
    pub async fn collect(self) -> Result<ListingResult, ListingError> {
        let entries: Vec<StorageEntry> = self.into_stream().try_collect().await?;
        let complete = entries.iter().all(|e| e.size_bytes.is_some());
        Ok(ListingResult { entries, complete })
    }
}
