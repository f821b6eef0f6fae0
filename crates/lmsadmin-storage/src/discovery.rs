use lmsadmin_core::{BucketRef, Config};

/// Default bucket of every tenant that has a base URL and an anon credential, in tenant
/// enumeration order. No backend call is made.
pub fn list_available(config: &Config) -> Vec<BucketRef> {
    config
        .tenants()
        .iter()
        .filter(|tenant| {
            if !tenant.is_usable() {
                tracing::warn!(
                    tenant = %tenant.code,
                    has_url = tenant.base_url.is_some(),
                    has_anon_credential = tenant.anon_credential.is_some(),
                    "Skipping tenant without URL or anon credential"
                );
            }
            tenant.is_usable()
        })
        .map(|tenant| BucketRef::explicit(tenant.code.default_bucket(), tenant.code.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestTenants;

    #[test]
    fn test_only_usable_tenants_in_fixed_order() {
        let config = TestTenants::new()
            .tenant("DQW", true, false)
            .url_only("RMW")
            .tenant("NSG", true, true)
            .build();

        let buckets: Vec<(String, String)> = list_available(&config)
            .into_iter()
            .map(|b| (b.bucket_name, b.tenant.to_string()))
            .collect();
        assert_eq!(
            buckets,
            vec![
                ("DQW-LMS".to_string(), "DQW".to_string()),
                ("NSG-LMS".to_string(), "NSG".to_string()),
            ]
        );
    }

    #[test]
    fn test_service_credential_alone_is_not_enough() {
        let config = TestTenants::new()
            .tenant("NSG", false, true)
            .missing("RMW")
            .build();
        assert!(list_available(&config).is_empty());
    }

    #[test]
    fn test_discovery_is_deterministic() {
        let config = TestTenants::new()
            .tenant("NSG", true, false)
            .tenant("RMW", true, false)
            .build();
        assert_eq!(list_available(&config), list_available(&config));
    }
}
