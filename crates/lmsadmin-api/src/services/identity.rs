//! Identity administration against the hosted identity admin API of the default project.

use async_trait::async_trait;
use lmsadmin_core::Config;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Users requested per page when listing.
const USERS_PER_PAGE: usize = 1000;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode identity response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct IdentityUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub user_metadata: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_confirmed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub user_metadata: serde_json::Value,
    pub email_confirm: bool,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_confirm: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<serde_json::Value>,
}

#[async_trait]
pub trait IdentityAdmin: Send + Sync {
    async fn create_user(&self, user: NewUser) -> Result<IdentityUser, IdentityError>;

    /// Every user of the project.
    async fn list_users(&self) -> Result<Vec<IdentityUser>, IdentityError>;

    async fn update_user(&self, id: &str, update: UserUpdate)
        -> Result<IdentityUser, IdentityError>;
}

#[derive(Clone)]
pub struct HttpIdentityAdmin {
    http: Client,
    base_url: String,
    credential: String,
}

#[derive(Deserialize)]
struct UserPage {
    #[serde(default)]
    users: Vec<IdentityUser>,
}

impl HttpIdentityAdmin {
    pub fn new(http: Client, base_url: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential: credential.into(),
        }
    }

    /// Create the client from config. Returns `None` if the default project is not configured.
    pub fn from_config(config: &Config) -> Option<Arc<dyn IdentityAdmin>> {
        let Some(project) = config.admin_project() else {
            tracing::warn!(
                "SUPABASE_URL / SUPABASE_SERVICE_ROLE_KEY not set, user administration disabled"
            );
            return None;
        };
        let http = match Client::builder()
            .timeout(Duration::from_secs(config.backend_timeout_secs()))
            .build()
        {
            Ok(http) => http,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create identity HTTP client");
                return None;
            }
        };
        tracing::info!(base_url = %project.base_url, "Identity admin client initialized");
        Some(Arc::new(Self::new(
            http,
            project.base_url.clone(),
            project.service_credential.clone(),
        )))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/admin{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, IdentityError> {
        let response = request
            .header("apikey", self.credential.as_str())
            .bearer_auth(&self.credential)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(IdentityError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    async fn decode_user(response: Response) -> Result<IdentityUser, IdentityError> {
        response
            .json::<IdentityUser>()
            .await
            .map_err(|e| IdentityError::Decode(e.to_string()))
    }
}

/// The identity API reports errors under `msg`, `message`, `error_description` or `error`.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["msg", "message", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(|m| m.as_str()).map(String::from))
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl IdentityAdmin for HttpIdentityAdmin {
    async fn create_user(&self, user: NewUser) -> Result<IdentityUser, IdentityError> {
        let response = self
            .send(self.http.post(self.url("/users")).json(&user))
            .await?;
        Self::decode_user(response).await
    }

    async fn list_users(&self) -> Result<Vec<IdentityUser>, IdentityError> {
        let mut users = Vec::new();
        let mut page = 1;
        loop {
            let response = self
                .send(self.http.get(self.url(&format!(
                    "/users?page={}&per_page={}",
                    page, USERS_PER_PAGE
                ))))
                .await?;
            let batch = response
                .json::<UserPage>()
                .await
                .map_err(|e| IdentityError::Decode(e.to_string()))?
                .users;
            let fetched = batch.len();
            users.extend(batch);
            if fetched < USERS_PER_PAGE {
                break;
            }
            page += 1;
        }
        tracing::debug!(users = users.len(), pages = page, "Identity users listed");
        Ok(users)
    }

    async fn update_user(
        &self,
        id: &str,
        update: UserUpdate,
    ) -> Result<IdentityUser, IdentityError> {
        let url = self.url(&format!("/users/{}", urlencoding::encode(id)));
        let response = self.send(self.http.put(url).json(&update)).await?;
        Self::decode_user(response).await
    }
}
