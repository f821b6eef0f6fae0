use crate::traits::{
    BucketInfo, ListOptions, ObjectEntry, StorageClient, StorageError, StorageResult,
    UploadOptions,
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;

/// Client for the hosted storage REST API (`/storage/v1`) of one project.
#[derive(Clone)]
pub struct SupabaseStorage {
    http: Client,
    base_url: String,
    credential: String,
}

impl SupabaseStorage {
    /// Create a client for the project at `base_url` using `credential` for both the
    /// `apikey` header and the bearer token.
    pub fn new(http: Client, base_url: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential: credential.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/storage/v1{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", self.credential.as_str())
            .bearer_auth(&self.credential)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> StorageResult<T> {
        let response = self.authorize(request).send().await?;
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| StorageError::Decode(e.to_string()))
    }
}

/// Percent-encode every segment of an object path, keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

async fn check_status(response: Response) -> StorageResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    // The API reports `{"statusCode": "...", "error": "...", "message": "..."}`.
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or(body);

    Err(StorageError::Backend {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl StorageClient for SupabaseStorage {
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        options: ListOptions,
    ) -> StorageResult<Vec<ObjectEntry>> {
        let start = std::time::Instant::now();
        let request = self
            .http
            .post(self.url(&format!("/object/list/{}", urlencoding::encode(bucket))))
            .json(&json!({
                "prefix": prefix,
                "limit": options.limit,
                "offset": options.offset,
                "sortBy": { "column": "name", "order": "asc" },
            }));

        let entries: Vec<ObjectEntry> = self.send_json(request).await.map_err(|e| {
            tracing::debug!(
                error = %e,
                bucket = %bucket,
                prefix = %prefix,
                offset = options.offset,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Storage list failed"
            );
            e
        })?;

        tracing::debug!(
            bucket = %bucket,
            prefix = %prefix,
            offset = options.offset,
            entries = entries.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Storage list page fetched"
        );

        Ok(entries)
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let size = data.len();
        let request = self
            .http
            .post(self.url(&format!(
                "/object/{}/{}",
                urlencoding::encode(bucket),
                encode_path(path)
            )))
            .header("content-type", options.content_type.as_str())
            .header(
                "cache-control",
                format!("max-age={}", options.cache_control_secs),
            )
            .header("x-upsert", if options.upsert { "true" } else { "false" })
            .body(data);

        let response = self.authorize(request).send().await?;
        check_status(response).await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                path = %path,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Storage upload failed"
            );
            e
        })?;

        tracing::info!(
            bucket = %bucket,
            path = %path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Storage upload successful"
        );

        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> StorageResult<usize> {
        let start = std::time::Instant::now();
        let request = self
            .http
            .delete(self.url(&format!("/object/{}", urlencoding::encode(bucket))))
            .json(&json!({ "prefixes": paths }));

        let removed: Vec<ObjectEntry> = self.send_json(request).await?;

        tracing::info!(
            bucket = %bucket,
            requested = paths.len(),
            removed = removed.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Storage remove successful"
        );

        Ok(removed.len())
    }

    async fn list_buckets(&self) -> StorageResult<Vec<BucketInfo>> {
        let request = self.http.get(self.url("/bucket"));
        self.send_json(request).await
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }
}
