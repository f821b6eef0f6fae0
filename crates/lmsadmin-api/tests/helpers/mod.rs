//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p lmsadmin-api`. Storage is the in-memory backend
//! from `lmsadmin-storage` (feature `test-utils`), identity is [`identity::MockIdentity`].

pub mod identity;

use axum_test::TestServer;
use identity::MockIdentity;
use lmsadmin_api::setup::routes;
use lmsadmin_api::{AppState, IdentityAdmin};
use lmsadmin_storage::testing::{MemoryBackend, TestTenants};
use std::sync::Arc;

/// Base URL of the default admin project.
pub const ADMIN_URL: &str = "https://main.storage.test";
pub const ADMIN_KEY: &str = "service-main";
pub const DEBUG_SECRET: &str = "debug-secret-for-tests";

/// Test application: server plus handles on the fake backends.
pub struct TestApp {
    pub server: TestServer,
    pub backend: MemoryBackend,
    pub identity: Arc<MockIdentity>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

/// Tenants used by most tests: NSG fully configured, RMW anon only, DQW missing.
pub fn default_tenants() -> TestTenants {
    TestTenants::new()
        .tenant("NSG", true, true)
        .tenant("RMW", true, false)
        .missing("DQW")
}

/// App with the admin project and debug secret configured.
pub fn setup_test_app(tenants: TestTenants) -> TestApp {
    build(
        tenants
            .var("SUPABASE_URL", ADMIN_URL)
            .var("SUPABASE_SERVICE_ROLE_KEY", ADMIN_KEY)
            .var("USAGE_DEBUG_SECRET", DEBUG_SECRET),
        true,
    )
}

/// App without a default admin project; user administration is unavailable.
pub fn setup_test_app_without_admin(tenants: TestTenants) -> TestApp {
    build(tenants, false)
}

fn build(tenants: TestTenants, with_identity: bool) -> TestApp {
    let config = Arc::new(tenants.build());
    let backend = MemoryBackend::new();
    let identity = Arc::new(MockIdentity::default());

    let identity_admin: Option<Arc<dyn IdentityAdmin>> = if with_identity {
        Some(identity.clone() as Arc<dyn IdentityAdmin>)
    } else {
        None
    };
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::new(backend.factory()),
        identity_admin,
    ));
    let router = routes::setup_routes(&config, state).expect("routes should build");
    let server = TestServer::new(router).expect("test server should start");

    TestApp {
        server,
        backend,
        identity,
    }
}

pub fn nsg_url() -> String {
    TestTenants::base_url("NSG")
}

pub fn rmw_url() -> String {
    TestTenants::base_url("RMW")
}
