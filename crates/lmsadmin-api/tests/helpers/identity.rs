//! In-memory identity admin.

use async_trait::async_trait;
use lmsadmin_api::services::identity::{NewUser, UserUpdate};
use lmsadmin_api::{IdentityAdmin, IdentityError, IdentityUser};
use std::sync::Mutex;

#[derive(Default)]
pub struct MockIdentity {
    users: Mutex<Vec<IdentityUser>>,
    created: Mutex<Vec<NewUser>>,
}

impl MockIdentity {
    pub fn add_user(&self, id: &str, email: &str) {
        self.users.lock().unwrap().push(IdentityUser {
            id: id.to_string(),
            email: Some(email.to_string()),
            user_metadata: serde_json::json!({ "role": "user" }),
            email_confirmed_at: None,
            created_at: None,
        });
    }

    pub fn user(&self, id: &str) -> Option<IdentityUser> {
        self.users.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }

    /// Create-user calls that reached the identity service.
    pub fn created(&self) -> Vec<NewUser> {
        self.created.lock().unwrap().clone()
    }

    /// Password last set through `update_user`, kept in `user_metadata.password` for tests.
    pub fn password_of(&self, id: &str) -> Option<String> {
        self.user(id)
            .and_then(|u| u.user_metadata.get("password").cloned())
            .and_then(|p| p.as_str().map(String::from))
    }
}

#[async_trait]
impl IdentityAdmin for MockIdentity {
    async fn create_user(&self, user: NewUser) -> Result<IdentityUser, IdentityError> {
        self.created.lock().unwrap().push(user.clone());
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email.as_deref() == Some(user.email.as_str())) {
            return Err(IdentityError::Api {
                status: 422,
                message: "A user with this email address has already been registered"
                    .to_string(),
            });
        }
        let created = IdentityUser {
            id: format!("user-{}", users.len() + 1),
            email: Some(user.email),
            user_metadata: user.user_metadata,
            email_confirmed_at: user
                .email_confirm
                .then(|| "2024-01-01T00:00:00Z".to_string()),
            created_at: Some("2024-01-01T00:00:00Z".to_string()),
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn list_users(&self) -> Result<Vec<IdentityUser>, IdentityError> {
        Ok(self.users.lock().unwrap().clone())
    }

    async fn update_user(
        &self,
        id: &str,
        update: UserUpdate,
    ) -> Result<IdentityUser, IdentityError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| IdentityError::Api {
                status: 404,
                message: "User not found".to_string(),
            })?;

        if !user.user_metadata.is_object() {
            user.user_metadata = serde_json::json!({});
        }
        if let (Some(target), Some(serde_json::Value::Object(patch))) =
            (user.user_metadata.as_object_mut(), update.user_metadata)
        {
            target.extend(patch);
        }
        if let (Some(target), Some(password)) =
            (user.user_metadata.as_object_mut(), update.password)
        {
            target.insert("password".to_string(), serde_json::Value::String(password));
        }
        if update.email_confirm == Some(true) {
            user.email_confirmed_at = Some("2024-01-01T00:00:00Z".to_string());
        }
        Ok(user.clone())
    }
}
