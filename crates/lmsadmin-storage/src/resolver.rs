//! Tenant credential resolution.
//!
//! Maps a bucket name or account code to the project endpoint and credential of the owning
//! tenant. Resolution order: explicit account, then the bucket name prefix. A tenant that
//! lacks the URL or the requested credential is reported, never replaced by another tenant.

use crate::factory::ClientFactory;
use crate::traits::{StorageClient, StorageError};
use lmsadmin_core::{BucketRef, Config, Privilege, TenantCode, TenantConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("tenant {tenant} has no {privilege} access configured: missing {missing_key}")]
    TenantNotConfigured {
        tenant: String,
        privilege: Privilege,
        missing_key: String,
    },

    #[error("failed to build storage client for tenant {tenant}: {source}")]
    Client {
        tenant: TenantCode,
        #[source]
        source: StorageError,
    },
}

/// A storage client bound to the tenant and tier that resolved it.
#[derive(Clone)]
pub struct ResolvedClient {
    pub bucket: BucketRef,
    pub privilege: Privilege,
    pub client: Arc<dyn StorageClient>,
}

impl std::fmt::Debug for ResolvedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedClient")
            .field("bucket", &self.bucket)
            .field("privilege", &self.privilege)
            .field("endpoint", &self.client.endpoint())
            .finish()
    }
}

pub struct TenantResolver {
    config: Arc<Config>,
    factory: Arc<dyn ClientFactory>,
    clients: Mutex<HashMap<(TenantCode, Privilege), Arc<dyn StorageClient>>>,
}

impl TenantResolver {
    pub fn new(config: Arc<Config>, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            config,
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Tenants in their fixed enumeration order.
    pub fn tenants(&self) -> &[TenantConfig] {
        self.config.tenants()
    }

    /// Resolve the client for `bucket` (or `account`, when given) at `privilege`.
    pub fn resolve(
        &self,
        bucket: &str,
        account: Option<&str>,
        privilege: Privilege,
    ) -> Result<ResolvedClient, ResolverError> {
        let bucket_ref = self.bucket_ref(bucket, account)?;
        let client = self.client_for(&bucket_ref.tenant, privilege)?;
        Ok(ResolvedClient {
            bucket: bucket_ref,
            privilege,
            client,
        })
    }

    /// Resolve at the lowest tier the tenant has configured: anon, else service.
    pub fn resolve_lowest(
        &self,
        bucket: &str,
        account: Option<&str>,
    ) -> Result<ResolvedClient, ResolverError> {
        let bucket_ref = self.bucket_ref(bucket, account)?;
        let privilege = if self.has_credential(&bucket_ref.tenant, Privilege::Anon)
            || !self.has_credential(&bucket_ref.tenant, Privilege::Service)
        {
            Privilege::Anon
        } else {
            Privilege::Service
        };
        let client = self.client_for(&bucket_ref.tenant, privilege)?;
        Ok(ResolvedClient {
            bucket: bucket_ref,
            privilege,
            client,
        })
    }

    /// Resolve at the highest tier the tenant has configured: service, else anon.
    pub fn resolve_highest(
        &self,
        bucket: &str,
        account: Option<&str>,
    ) -> Result<ResolvedClient, ResolverError> {
        let bucket_ref = self.bucket_ref(bucket, account)?;
        let privilege = if self.has_credential(&bucket_ref.tenant, Privilege::Service) {
            Privilege::Service
        } else {
            Privilege::Anon
        };
        let client = self.client_for(&bucket_ref.tenant, privilege)?;
        Ok(ResolvedClient {
            bucket: bucket_ref,
            privilege,
            client,
        })
    }

    /// Whether `tenant` has both a base URL and the credential for `privilege`.
    pub fn has_credential(&self, tenant: &TenantCode, privilege: Privilege) -> bool {
        self.config
            .tenant(tenant)
            .map(|t| t.base_url.is_some() && t.credential(privilege).is_some())
            .unwrap_or(false)
    }

    /// Client for a known tenant. Handles are built once per (tenant, privilege).
    pub fn client_for(
        &self,
        tenant: &TenantCode,
        privilege: Privilege,
    ) -> Result<Arc<dyn StorageClient>, ResolverError> {
        let key = (tenant.clone(), privilege);
        if let Some(client) = self.lock_clients().get(&key) {
            return Ok(client.clone());
        }

        let not_configured = |missing_key: String| ResolverError::TenantNotConfigured {
            tenant: tenant.to_string(),
            privilege,
            missing_key,
        };

        let tenant_config = self
            .config
            .tenant(tenant)
            .ok_or_else(|| not_configured(TenantConfig::url_key(tenant)))?;
        let base_url = tenant_config
            .base_url
            .as_deref()
            .ok_or_else(|| not_configured(TenantConfig::url_key(tenant)))?;
        let credential = tenant_config
            .credential(privilege)
            .ok_or_else(|| not_configured(TenantConfig::credential_key(tenant, privilege)))?;

        let client = self
            .factory
            .connect(base_url, credential)
            .map_err(|source| ResolverError::Client {
                tenant: tenant.clone(),
                source,
            })?;

        tracing::debug!(tenant = %tenant, privilege = %privilege, "Storage client created");
        self.lock_clients().insert(key, client.clone());
        Ok(client)
    }

    fn bucket_ref(&self, bucket: &str, account: Option<&str>) -> Result<BucketRef, ResolverError> {
        BucketRef::resolve(bucket, account).ok_or_else(|| ResolverError::TenantNotConfigured {
            tenant: bucket.to_string(),
            privilege: Privilege::Anon,
            missing_key: "TENANT_CODES".to_string(),
        })
    }

    fn lock_clients(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<(TenantCode, Privilege), Arc<dyn StorageClient>>> {
        // Handles are immutable; a poisoned map is still consistent.
        self.clients.lock().unwrap_or_else(|e| e.into_inner())
    }
}
