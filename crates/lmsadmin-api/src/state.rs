//! Application state shared by all handlers.

use crate::services::identity::IdentityAdmin;
use lmsadmin_core::{AppError, Config};
use lmsadmin_storage::{
    ClientFactory, DeletionPlanner, StorageClient, TenantResolver, UsageService,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub resolver: Arc<TenantResolver>,
    pub usage: Arc<UsageService>,
    pub deletion: Arc<DeletionPlanner>,
    /// Builds clients for the default admin project.
    pub factory: Arc<dyn ClientFactory>,
    /// `None` when the default admin project is not configured.
    pub identity: Option<Arc<dyn IdentityAdmin>>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        factory: Arc<dyn ClientFactory>,
        identity: Option<Arc<dyn IdentityAdmin>>,
    ) -> Self {
        let page_size = config.listing_page_size();
        let resolver = Arc::new(TenantResolver::new(config.clone(), factory.clone()));
        let usage = UsageService::new(resolver.clone()).with_page_size(page_size);
        let deletion = DeletionPlanner::new(resolver.clone()).with_page_size(page_size);

        Self {
            config,
            resolver,
            usage: Arc::new(usage),
            deletion: Arc::new(deletion),
            factory,
            identity,
        }
    }

    /// Storage client of the default admin project, using its service credential.
    pub fn admin_storage(&self) -> Result<Arc<dyn StorageClient>, AppError> {
        let project = self
            .config
            .admin_project()
            .ok_or_else(admin_not_configured)?;
        self.factory
            .connect(&project.base_url, &project.service_credential)
            .map_err(AppError::from)
    }

    pub fn identity(&self) -> Result<&dyn IdentityAdmin, AppError> {
        self.identity
            .as_deref()
            .ok_or_else(admin_not_configured)
    }
}

fn admin_not_configured() -> AppError {
    AppError::TenantNotConfigured {
        tenant: "default".to_string(),
        privilege: "service".to_string(),
        missing_key: "SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY".to_string(),
    }
}
