use crate::{StorageClient, StorageError, StorageResult, SupabaseStorage};
use lmsadmin_core::Config;
use std::sync::Arc;
use std::time::Duration;

/// Builds [`StorageClient`] handles for a project endpoint and credential.
///
/// The resolver only ever talks to storage through a factory, so tests can swap the
/// hosted backend for an in-memory one.
pub trait ClientFactory: Send + Sync {
    fn connect(&self, base_url: &str, credential: &str) -> StorageResult<Arc<dyn StorageClient>>;
}

/// Factory for the hosted storage REST API. All clients share one connection pool.
#[derive(Clone)]
pub struct HttpClientFactory {
    http: reqwest::Client,
}

impl HttpClientFactory {
    pub fn new(timeout: Duration) -> StorageResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { http })
    }
}

impl ClientFactory for HttpClientFactory {
    fn connect(&self, base_url: &str, credential: &str) -> StorageResult<Arc<dyn StorageClient>> {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(StorageError::ConfigError(format!(
                "Storage base URL must be http(s): {}",
                base_url
            )));
        }
        Ok(Arc::new(SupabaseStorage::new(
            self.http.clone(),
            base_url,
            credential,
        )))
    }
}

/// Create the client factory for the configured deployment
pub fn create_client_factory(config: &Config) -> StorageResult<Arc<dyn ClientFactory>> {
    let factory = HttpClientFactory::new(Duration::from_secs(config.backend_timeout_secs()))?;
    Ok(Arc::new(factory))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_rejects_non_http_url() {
        let factory = HttpClientFactory::new(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            factory.connect("ftp://nsg.example.co", "key"),
            Err(StorageError::ConfigError(_))
        ));
        let client = factory.connect("https://nsg.example.co", "key").unwrap();
        assert_eq!(client.endpoint(), "https://nsg.example.co");
    }
}
