//! In-memory hosted storage for tests.
//!
//! [`MemoryBackend`] emulates the storage API of any number of projects, keyed by base URL.
//! Credentials are recognised by prefix: `anon-…` lists at the restricted tier, `service-…`
//! at the privileged tier, anything else is rejected with 401.

use crate::factory::ClientFactory;
use crate::traits::{
    BucketInfo, ListOptions, ObjectEntry, StorageClient, StorageError, StorageResult,
    UploadOptions,
};
use async_trait::async_trait;
use bytes::Bytes;
use lmsadmin_core::{Config, Privilege};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub size: u64,
    pub content_type: String,
}

#[derive(Default)]
struct Project {
    buckets: BTreeMap<String, BTreeMap<String, StoredObject>>,
    hidden_sizes: HashSet<(String, String)>,
    failing_prefixes: HashSet<(String, String)>,
    deny_removal: bool,
}

#[derive(Default)]
struct BackendState {
    projects: HashMap<String, Project>,
    list_requests: usize,
    remove_requests: Vec<String>,
    upload_requests: usize,
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<BackendState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn factory(&self) -> MemoryClientFactory {
        MemoryClientFactory {
            backend: self.clone(),
        }
    }

    pub fn client(&self, base_url: &str, credential: &str) -> Arc<dyn StorageClient> {
        Arc::new(MemoryStorage {
            backend: self.clone(),
            base_url: base_url.to_string(),
            privilege: tier_of(credential),
        })
    }

    pub fn create_bucket(&self, base_url: &str, bucket: &str) {
        self.lock()
            .projects
            .entry(base_url.to_string())
            .or_default()
            .buckets
            .entry(bucket.to_string())
            .or_default();
    }

    pub fn put_object(&self, base_url: &str, bucket: &str, path: &str, size: u64) {
        self.lock()
            .projects
            .entry(base_url.to_string())
            .or_default()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(
                path.to_string(),
                StoredObject {
                    size,
                    content_type: "application/octet-stream".to_string(),
                },
            );
    }

    pub fn object(&self, base_url: &str, bucket: &str, path: &str) -> Option<StoredObject> {
        self.lock()
            .projects
            .get(base_url)
            .and_then(|p| p.buckets.get(bucket))
            .and_then(|objects| objects.get(path))
            .cloned()
    }

    /// Every object path of a bucket in name order.
    pub fn object_paths(&self, base_url: &str, bucket: &str) -> Vec<String> {
        self.lock()
            .projects
            .get(base_url)
            .and_then(|p| p.buckets.get(bucket))
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Anon listings report metadata for `path` without a size.
    pub fn hide_size_from_anon(&self, base_url: &str, bucket: &str, path: &str) {
        self.lock()
            .projects
            .entry(base_url.to_string())
            .or_default()
            .hidden_sizes
            .insert((bucket.to_string(), path.to_string()));
    }

    /// Listing exactly `prefix` fails with a 500.
    pub fn fail_listing(&self, base_url: &str, bucket: &str, prefix: &str) {
        self.lock()
            .projects
            .entry(base_url.to_string())
            .or_default()
            .failing_prefixes
            .insert((bucket.to_string(), prefix.to_string()));
    }

    /// Every remove call against the project fails with a 403.
    pub fn deny_removal(&self, base_url: &str) {
        self.lock()
            .projects
            .entry(base_url.to_string())
            .or_default()
            .deny_removal = true;
    }

    pub fn list_requests(&self) -> usize {
        self.lock().list_requests
    }

    pub fn remove_requests(&self) -> usize {
        self.lock().remove_requests.len()
    }

    /// Base URLs of the remove calls, in call order.
    pub fn remove_targets(&self) -> Vec<String> {
        self.lock().remove_requests.clone()
    }

    pub fn upload_requests(&self) -> usize {
        self.lock().upload_requests
    }
}

fn tier_of(credential: &str) -> Option<Privilege> {
    if credential.starts_with("anon-") {
        Some(Privilege::Anon)
    } else if credential.starts_with("service-") {
        Some(Privilege::Service)
    } else {
        None
    }
}

fn backend_error(status: u16, message: &str) -> StorageError {
    StorageError::Backend {
        status,
        message: message.to_string(),
    }
}

fn folder_entry(name: &str) -> ObjectEntry {
    ObjectEntry {
        name: name.to_string(),
        id: None,
        updated_at: None,
        created_at: None,
        metadata: None,
    }
}

fn file_entry(name: &str, object: &StoredObject, hide_size: bool) -> ObjectEntry {
    let metadata = if hide_size {
        json!({ "mimetype": object.content_type })
    } else {
        json!({ "size": object.size, "mimetype": object.content_type })
    };
    ObjectEntry {
        name: name.to_string(),
        id: Some(format!("id-{}", name)),
        updated_at: Some("2024-01-01T00:00:00Z".to_string()),
        created_at: Some("2024-01-01T00:00:00Z".to_string()),
        metadata: Some(metadata),
    }
}

struct MemoryStorage {
    backend: MemoryBackend,
    base_url: String,
    privilege: Option<Privilege>,
}

impl MemoryStorage {
    fn authorize(&self) -> StorageResult<Privilege> {
        self.privilege
            .ok_or_else(|| backend_error(401, "Invalid API key"))
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        options: ListOptions,
    ) -> StorageResult<Vec<ObjectEntry>> {
        let mut state = self.backend.lock();
        state.list_requests += 1;
        let privilege = self.authorize()?;

        let project = state
            .projects
            .get(&self.base_url)
            .ok_or_else(|| backend_error(400, "Bucket not found"))?;
        let dir = prefix.trim_matches('/');
        if project
            .failing_prefixes
            .contains(&(bucket.to_string(), dir.to_string()))
        {
            return Err(backend_error(500, "Internal Server Error"));
        }
        let objects = project
            .buckets
            .get(bucket)
            .ok_or_else(|| backend_error(400, "Bucket not found"))?;

        let mut children: BTreeMap<String, ObjectEntry> = BTreeMap::new();
        for (path, object) in objects {
            let rest = if dir.is_empty() {
                path.as_str()
            } else {
                match path.strip_prefix(dir).and_then(|r| r.strip_prefix('/')) {
                    Some(rest) => rest,
                    None => continue,
                }
            };
            match rest.split_once('/') {
                Some((folder, _)) => {
                    children
                        .entry(folder.to_string())
                        .or_insert_with(|| folder_entry(folder));
                }
                None => {
                    let hide = privilege == Privilege::Anon
                        && project
                            .hidden_sizes
                            .contains(&(bucket.to_string(), path.clone()));
                    children.insert(rest.to_string(), file_entry(rest, object, hide));
                }
            }
        }

        Ok(children
            .into_values()
            .skip(options.offset)
            .take(options.limit)
            .collect())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> StorageResult<()> {
        let mut state = self.backend.lock();
        state.upload_requests += 1;
        self.authorize()?;

        let objects = state
            .projects
            .get_mut(&self.base_url)
            .and_then(|p| p.buckets.get_mut(bucket))
            .ok_or_else(|| backend_error(400, "Bucket not found"))?;
        if objects.contains_key(path) && !options.upsert {
            return Err(backend_error(409, "The resource already exists"));
        }
        objects.insert(
            path.to_string(),
            StoredObject {
                size: data.len() as u64,
                content_type: options.content_type.clone(),
            },
        );
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> StorageResult<usize> {
        let mut state = self.backend.lock();
        state.remove_requests.push(self.base_url.clone());
        self.authorize()?;

        let project = state
            .projects
            .get_mut(&self.base_url)
            .ok_or_else(|| backend_error(400, "Bucket not found"))?;
        if project.deny_removal {
            return Err(backend_error(
                403,
                "new row violates row-level security policy",
            ));
        }
        let objects = project
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| backend_error(400, "Bucket not found"))?;

        Ok(paths
            .iter()
            .filter(|path| objects.remove(path.as_str()).is_some())
            .count())
    }

    async fn list_buckets(&self) -> StorageResult<Vec<BucketInfo>> {
        let state = self.backend.lock();
        if self.authorize()? != Privilege::Service {
            return Ok(Vec::new());
        }
        Ok(state
            .projects
            .get(&self.base_url)
            .map(|p| {
                p.buckets
                    .keys()
                    .map(|name| BucketInfo {
                        id: name.clone(),
                        name: name.clone(),
                        public: false,
                        created_at: None,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }
}

/// [`ClientFactory`] handing out [`MemoryBackend`] clients.
#[derive(Clone)]
pub struct MemoryClientFactory {
    backend: MemoryBackend,
}

impl ClientFactory for MemoryClientFactory {
    fn connect(&self, base_url: &str, credential: &str) -> StorageResult<Arc<dyn StorageClient>> {
        Ok(self.backend.client(base_url, credential))
    }
}

/// Builds a [`Config`] whose tenants point at [`MemoryBackend`] projects.
#[derive(Debug, Clone, Default)]
pub struct TestTenants {
    codes: Vec<String>,
    vars: Vec<(String, String)>,
}

impl TestTenants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(code: &str) -> String {
        format!("https://{}.storage.test", code.to_lowercase())
    }

    pub fn anon_key(code: &str) -> String {
        format!("anon-{}", code)
    }

    pub fn service_key(code: &str) -> String {
        format!("service-{}", code)
    }

    /// Add a tenant with a base URL and the selected credentials.
    pub fn tenant(mut self, code: &str, anon: bool, service: bool) -> Self {
        self.codes.push(code.to_string());
        self.vars
            .push((format!("SUPABASE_URL_{}", code), Self::base_url(code)));
        if anon {
            self.vars
                .push((format!("SUPABASE_ANON_KEY_{}", code), Self::anon_key(code)));
        }
        if service {
            self.vars.push((
                format!("SUPABASE_SERVICE_ROLE_KEY_{}", code),
                Self::service_key(code),
            ));
        }
        self
    }

    pub fn url_only(self, code: &str) -> Self {
        self.tenant(code, false, false)
    }

    /// Add a tenant code with nothing configured.
    pub fn missing(mut self, code: &str) -> Self {
        self.codes.push(code.to_string());
        self
    }

    pub fn var(mut self, key: &str, value: &str) -> Self {
        self.vars.push((key.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> Config {
        let mut vars = self.vars;
        vars.push(("TENANT_CODES".to_string(), self.codes.join(",")));
        Config::from_vars(vars).expect("test configuration should be valid")
    }
}
