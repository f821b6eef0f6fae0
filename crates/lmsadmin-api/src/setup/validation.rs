//! Configuration validation
//!
//! Validates critical configuration values at startup to catch misconfigurations early.

use anyhow::Result;
use lmsadmin_core::Config;

/// Validate critical configuration values
///
/// Fails on settings that would make the service unsafe to run and warns about ones that
/// only disable part of the surface.
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    if config.usable_tenants().next().is_none() {
        tracing::warn!(
            "No tenant has both SUPABASE_URL_<CODE> and SUPABASE_ANON_KEY_<CODE>; bucket discovery will be empty"
        );
    }

    for tenant in config.usable_tenants() {
        if tenant.service_credential.is_none() {
            tracing::warn!(
                tenant = %tenant.code,
                "No service credential: deletion is unavailable and usage cannot escalate"
            );
        }
    }

    if config.usage_debug_secret().is_none() {
        tracing::info!("USAGE_DEBUG_SECRET not set, diagnostic listing endpoint disabled");
    }

    if config.is_production() && config.usage_debug_secret().is_some_and(|s| s.len() < 16) {
        return Err(anyhow::anyhow!(
            "USAGE_DEBUG_SECRET must be at least 16 characters long in production"
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_debug_secret_rejected_in_production() {
        let config = Config::from_vars([
            ("ENVIRONMENT", "production"),
            ("CORS_ORIGINS", "https://admin.example.com"),
            ("USAGE_DEBUG_SECRET", "short"),
        ])
        .unwrap();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_development_defaults_pass() {
        let config = Config::from_vars([("USAGE_DEBUG_SECRET", "short")]).unwrap();
        assert!(validate_config(&config).is_ok());
    }
}
