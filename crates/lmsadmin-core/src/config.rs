//! Configuration module
//!
//! Tenant projects, the default admin project and deployment settings. Everything is read
//! once at startup into an immutable [`Config`] which is then shared by reference.

use std::collections::HashMap;
use std::fmt;

use crate::tenant::{Privilege, TenantCode};

const DEFAULT_TENANT_CODES: &str = "NSG,RMW,DQW";
const SERVER_PORT: u16 = 4000;
const BUCKET_QUOTA_GB: u64 = 1;
const LISTING_PAGE_SIZE: usize = 1000;
const BACKEND_TIMEOUT_SECS: u64 = 30;
const MAX_UPLOAD_SIZE_MB: usize = 50;

/// Connection settings of one tenant project.
///
/// A tenant is usable only when both `base_url` and `anon_credential` are present.
#[derive(Clone, PartialEq, Eq)]
pub struct TenantConfig {
    pub code: TenantCode,
    pub base_url: Option<String>,
    pub anon_credential: Option<String>,
    pub service_credential: Option<String>,
}

impl TenantConfig {
    pub fn is_usable(&self) -> bool {
        self.base_url.is_some() && self.anon_credential.is_some()
    }

    pub fn credential(&self, privilege: Privilege) -> Option<&str> {
        match privilege {
            Privilege::Anon => self.anon_credential.as_deref(),
            Privilege::Service => self.service_credential.as_deref(),
        }
    }

    /// Configuration key holding the base URL of `code`.
    pub fn url_key(code: &TenantCode) -> String {
        format!("SUPABASE_URL_{}", code)
    }

    /// Configuration key holding the credential of `code` for `privilege`.
    pub fn credential_key(code: &TenantCode, privilege: Privilege) -> String {
        match privilege {
            Privilege::Anon => format!("SUPABASE_ANON_KEY_{}", code),
            Privilege::Service => format!("SUPABASE_SERVICE_ROLE_KEY_{}", code),
        }
    }

    fn from_vars(code: TenantCode, vars: &HashMap<String, String>) -> Self {
        let base_url = lookup(vars, &Self::url_key(&code))
            .or_else(|| lookup(vars, &format!("NEXT_PUBLIC_SUPABASE_URL_{}", code)))
            .map(|url| url.trim_end_matches('/').to_string());
        let anon_credential = lookup(vars, &Self::credential_key(&code, Privilege::Anon))
            .or_else(|| lookup(vars, &format!("NEXT_PUBLIC_SUPABASE_ANON_KEY_{}", code)));
        let service_credential = lookup(vars, &Self::credential_key(&code, Privilege::Service));

        Self {
            code,
            base_url,
            anon_credential,
            service_credential,
        }
    }
}

// Credentials stay out of logs.
impl fmt::Debug for TenantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantConfig")
            .field("code", &self.code)
            .field("base_url", &self.base_url)
            .field("has_anon_credential", &self.anon_credential.is_some())
            .field("has_service_credential", &self.service_credential.is_some())
            .finish()
    }
}

/// The project used for identity administration and raw bucket listing.
#[derive(Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    pub base_url: String,
    pub service_credential: String,
}

impl fmt::Debug for ProjectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectConfig")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Deployment configuration
#[derive(Clone, Debug)]
pub struct AdminConfig {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    /// Tenants in their fixed enumeration order, usable or not.
    pub tenants: Vec<TenantConfig>,
    pub admin_project: Option<ProjectConfig>,
    pub quota_bytes: u64,
    pub usage_debug_secret: Option<String>,
    pub listing_page_size: usize,
    pub backend_timeout_secs: u64,
    pub max_upload_size_bytes: usize,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<AdminConfig>);

impl Config {
    fn as_admin(&self) -> &AdminConfig {
        &self.0
    }

    /// Load `.env` (if present) and build the configuration from the process environment.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Build the configuration from explicit key/value pairs.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, anyhow::Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let config = AdminConfig::from_vars(&vars)?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_admin().validate()
    }

    pub fn is_production(&self) -> bool {
        let env = self.as_admin().environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.as_admin().server_port
    }

    pub fn environment(&self) -> &str {
        &self.as_admin().environment
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_admin().cors_origins
    }

    pub fn tenants(&self) -> &[TenantConfig] {
        &self.as_admin().tenants
    }

    pub fn tenant(&self, code: &TenantCode) -> Option<&TenantConfig> {
        self.as_admin().tenants.iter().find(|t| &t.code == code)
    }

    pub fn usable_tenants(&self) -> impl Iterator<Item = &TenantConfig> {
        self.as_admin().tenants.iter().filter(|t| t.is_usable())
    }

    pub fn admin_project(&self) -> Option<&ProjectConfig> {
        self.as_admin().admin_project.as_ref()
    }

    pub fn quota_bytes(&self) -> u64 {
        self.as_admin().quota_bytes
    }

    pub fn usage_debug_secret(&self) -> Option<&str> {
        self.as_admin().usage_debug_secret.as_deref()
    }

    pub fn listing_page_size(&self) -> usize {
        self.as_admin().listing_page_size
    }

    pub fn backend_timeout_secs(&self) -> u64 {
        self.as_admin().backend_timeout_secs
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.as_admin().max_upload_size_bytes
    }
}

fn lookup(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn lookup_parsed<T: std::str::FromStr>(vars: &HashMap<String, String>, key: &str, default: T) -> T {
    parse_or_default(key, lookup(vars, key), default)
}

fn parse_or_default<T: std::str::FromStr>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        Some(value) => value.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %value, "Invalid number, using default");
            default
        }),
        None => default,
    }
}

/// `value * factor`, clamped to the type's maximum on overflow.
fn scale<T: Copy + fmt::Display>(
    key: &str,
    value: T,
    factor: T,
    checked: fn(T, T) -> Option<T>,
    max: T,
) -> T {
    checked(value, factor).unwrap_or_else(|| {
        tracing::warn!(key, value = %value, clamped = %max, "Value too large, clamping");
        max
    })
}

impl AdminConfig {
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let environment = lookup(vars, "ENVIRONMENT")
            .or_else(|| lookup(vars, "APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins = lookup(vars, "CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let server_port = match lookup(vars, "PORT") {
            Some(port) => port
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            None => SERVER_PORT,
        };

        let mut tenants: Vec<TenantConfig> = Vec::new();
        let codes = lookup(vars, "TENANT_CODES").unwrap_or_else(|| DEFAULT_TENANT_CODES.to_string());
        for code in codes.split(',').filter_map(TenantCode::new) {
            if tenants.iter().any(|t| t.code == code) {
                continue;
            }
            tenants.push(TenantConfig::from_vars(code, vars));
        }

        let admin_url = lookup(vars, "SUPABASE_URL").or_else(|| lookup(vars, "NEXT_PUBLIC_SUPABASE_URL"));
        let admin_key = lookup(vars, "SUPABASE_SERVICE_ROLE_KEY");
        let admin_project = match (admin_url, admin_key) {
            (Some(base_url), Some(service_credential)) => Some(ProjectConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                service_credential,
            }),
            _ => None,
        };

        let quota_gb = parse_or_default(
            "BUCKET_QUOTA_GB",
            lookup(vars, "BUCKET_QUOTA_GB").or_else(|| lookup(vars, "NEXT_PUBLIC_BUCKET_QUOTA_GB")),
            BUCKET_QUOTA_GB,
        );
        let max_upload_mb = lookup_parsed(vars, "MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB);

        let config = AdminConfig {
            server_port,
            environment,
            cors_origins,
            tenants,
            admin_project,
            quota_bytes: scale("BUCKET_QUOTA_GB", quota_gb, 1 << 30, u64::checked_mul, u64::MAX),
            usage_debug_secret: lookup(vars, "USAGE_DEBUG_SECRET"),
            listing_page_size: lookup_parsed(vars, "LISTING_PAGE_SIZE", LISTING_PAGE_SIZE).max(1),
            backend_timeout_secs: lookup_parsed(vars, "BACKEND_TIMEOUT_SECS", BACKEND_TIMEOUT_SECS)
                .max(1),
            max_upload_size_bytes: scale(
                "MAX_UPLOAD_SIZE_MB",
                max_upload_mb,
                1 << 20,
                usize::checked_mul,
                usize::MAX,
            ),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let env = self.environment.to_lowercase();
        let is_production = env == "production" || env == "prod";
        if is_production && self.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.tenants.is_empty() {
            return Err(anyhow::anyhow!("TENANT_CODES must name at least one tenant"));
        }

        for tenant in self.tenants.iter().filter(|t| !t.is_usable()) {
            tracing::warn!(
                tenant = %tenant.code,
                has_url = tenant.base_url.is_some(),
                has_anon_credential = tenant.anon_credential.is_some(),
                "Tenant is not fully configured and will be unavailable"
            );
        }

        Ok(())
    }
}
