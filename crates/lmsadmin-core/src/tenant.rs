//! Tenant codes, privilege tiers and bucket naming.
//!
//! A bucket belongs to the tenant named by the part of its name before the first `-`
//! (`NSG-LMS` belongs to `NSG`). That is a naming convention, not something the backend
//! enforces, so callers may always pass the tenant explicitly instead.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Separator between the tenant prefix and the rest of a bucket name.
pub const BUCKET_SEPARATOR: char = '-';

/// Suffix of the bucket every tenant project is provisioned with.
pub const DEFAULT_BUCKET_SUFFIX: &str = "LMS";

/// Upper-cased tenant (environment) code such as `NSG`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantCode(String);

impl TenantCode {
    /// Normalize a raw code. Returns `None` for blank input.
    pub fn new(raw: &str) -> Option<Self> {
        let code = raw.trim().to_uppercase();
        if code.is_empty() {
            None
        } else {
            Some(TenantCode(code))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The conventional bucket name of this tenant, e.g. `NSG-LMS`.
    pub fn default_bucket(&self) -> String {
        format!("{}{}{}", self.0, BUCKET_SEPARATOR, DEFAULT_BUCKET_SUFFIX)
    }
}

impl Display for TenantCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// Credential tier used against a tenant project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    /// Restricted public key; may hide metadata of objects it does not own.
    Anon,
    /// Administrative key with full access.
    Service,
}

impl Privilege {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privilege::Anon => "anon",
            Privilege::Service => "service",
        }
    }
}

impl Display for Privilege {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Privilege {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anon" => Ok(Privilege::Anon),
            "service" => Ok(Privilege::Service),
            _ => Err(anyhow::anyhow!("Invalid privilege tier: {}", s)),
        }
    }
}

/// A bucket together with the tenant whose project hosts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketRef {
    pub bucket_name: String,
    pub tenant: TenantCode,
}

impl BucketRef {
    /// Bucket with an explicitly supplied tenant.
    pub fn explicit(bucket_name: impl Into<String>, tenant: TenantCode) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            tenant,
        }
    }

    /// Infer the tenant from the bucket name prefix, case-insensitively.
    pub fn infer(bucket_name: &str) -> Option<Self> {
        let prefix = bucket_name.split(BUCKET_SEPARATOR).next().unwrap_or_default();
        TenantCode::new(prefix).map(|tenant| Self::explicit(bucket_name, tenant))
    }

    /// Explicit account first, then the bucket prefix.
    pub fn resolve(bucket_name: &str, account: Option<&str>) -> Option<Self> {
        match account.and_then(TenantCode::new) {
            Some(tenant) => Some(Self::explicit(bucket_name, tenant)),
            None => Self::infer(bucket_name),
        }
    }

    /// The default bucket of an account, e.g. account `rmw` gives `RMW-LMS`.
    pub fn for_account(account: &str) -> Option<Self> {
        TenantCode::new(account).map(|tenant| Self::explicit(tenant.default_bucket(), tenant))
    }
}
