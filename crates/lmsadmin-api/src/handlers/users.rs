//! User administration on the default admin project.

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::non_empty;
use crate::services::identity::{IdentityAdmin, IdentityUser, NewUser, UserUpdate};
use crate::state::AppState;
use axum::{extract::State, Json};
use futures::future::join_all;
use lmsadmin_core::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use utoipa::ToSchema;

/// Columns searched for a display name, in order.
const DISPLAY_NAME_KEYS: [&str; 4] = ["display_name", "employee name", "employee_name", "name"];

type Row = Map<String, Value>;

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkInsertRequest {
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<Row>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RowResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<IdentityUser>,
    /// The input row, echoed back.
    #[schema(value_type = Object)]
    pub row: Row,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkInsertResponse {
    pub message: String,
    pub results: Vec<RowResult>,
}

/// Cell value as trimmed text; numbers are accepted since spreadsheet exports produce them.
fn cell(row: &Row, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn display_name(row: &Row) -> String {
    DISPLAY_NAME_KEYS
        .iter()
        .map(|key| cell(row, key))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

/// Anything other than `admin` is a regular user.
fn normalize_role(raw: &str) -> &'static str {
    if raw.trim().eq_ignore_ascii_case("admin") {
        "admin"
    } else {
        "user"
    }
}

async fn insert_row(identity: &dyn IdentityAdmin, row: Row) -> RowResult {
    let email = cell(&row, "email");
    let password = cell(&row, "password");
    if email.is_empty() || password.is_empty() {
        return RowResult {
            success: false,
            error: Some("email or password missing".to_string()),
            user: None,
            row,
        };
    }

    let new_user = NewUser {
        email,
        password,
        user_metadata: json!({
            "display_name": display_name(&row),
            "role": normalize_role(&cell(&row, "role")),
        }),
        email_confirm: true,
    };

    match identity.create_user(new_user).await {
        Ok(user) => RowResult {
            success: true,
            error: None,
            user: Some(user),
            row,
        },
        Err(e) => RowResult {
            success: false,
            error: Some(e.to_string()),
            user: None,
            row,
        },
    }
}

/// Create one user per row. Rows are submitted concurrently and each row reports its own
/// outcome; a failing row never aborts the others.
#[utoipa::path(
    post,
    path = "/api/users/bulk-insert",
    tag = "users",
    request_body = BulkInsertRequest,
    responses(
        (status = 200, description = "Per-row results", body = BulkInsertResponse),
        (status = 500, description = "Admin project not configured", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(rows = request.rows.len()))]
pub async fn bulk_insert(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<BulkInsertRequest>,
) -> Result<Json<BulkInsertResponse>, HttpAppError> {
    let identity = state.identity()?;

    if request.rows.is_empty() {
        return Ok(Json(BulkInsertResponse {
            message: "No rows provided".to_string(),
            results: Vec::new(),
        }));
    }

    let results = join_all(
        request
            .rows
            .into_iter()
            .map(|row| insert_row(identity, row)),
    )
    .await;

    let created = results.iter().filter(|r| r.success).count();
    tracing::info!(
        created = created,
        failed = results.len() - created,
        "Bulk insert finished"
    );

    Ok(Json(BulkInsertResponse {
        message: "Bulk insert finished".to_string(),
        results,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResetPasswordResponse {
    pub success: bool,
    pub message: String,
    pub user: IdentityUser,
}

#[utoipa::path(
    post,
    path = "/api/users/reset-password",
    tag = "users",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = ResetPasswordResponse),
        (status = 400, description = "Email or new password missing", body = ErrorResponse),
        (status = 404, description = "No user with that email", body = ErrorResponse),
        (status = 500, description = "Identity backend failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request))]
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<ResetPasswordResponse>, HttpAppError> {
    let (Some(email), Some(new_password)) = (
        non_empty(request.email.as_deref()),
        request.new_password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::Validation("email and newPassword are required".to_string()).into());
    };

    let identity = state.identity()?;
    let user = identity
        .list_users()
        .await?
        .into_iter()
        .find(|u| u.email.as_deref() == Some(email))
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let update = UserUpdate {
        password: Some(new_password.to_string()),
        email_confirm: Some(true),
        ..Default::default()
    };
    let user = identity.update_user(&user.id, update).await?;
    tracing::info!(user_id = %user.id, "Password reset");

    Ok(Json(ResetPasswordResponse {
        success: true,
        message: format!("Password updated for {}", email),
        user,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub user_id: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateRoleResponse {
    pub success: bool,
    pub user: IdentityUser,
}

#[utoipa::path(
    post,
    path = "/api/users/update-role",
    tag = "users",
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UpdateRoleResponse),
        (status = 400, description = "userId or role missing", body = ErrorResponse),
        (status = 500, description = "Identity backend failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request))]
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<UpdateRoleRequest>,
) -> Result<Json<UpdateRoleResponse>, HttpAppError> {
    let (Some(user_id), Some(role)) = (
        non_empty(request.user_id.as_deref()),
        non_empty(request.role.as_deref()),
    ) else {
        return Err(AppError::Validation("userId and role are required".to_string()).into());
    };

    let update = UserUpdate {
        user_metadata: Some(json!({ "role": role })),
        ..Default::default()
    };
    let user = state.identity()?.update_user(user_id, update).await?;
    tracing::info!(user_id = %user.id, role = %role, "Role updated");

    Ok(Json(UpdateRoleResponse {
        success: true,
        user,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_display_name_fallback_order() {
        let r = row(json!({ "employee name": "Ada", "name": "ignored" }));
        assert_eq!(display_name(&r), "Ada");

        let r = row(json!({ "display_name": "  ", "employee_name": "Grace" }));
        assert_eq!(display_name(&r), "Grace");

        assert_eq!(display_name(&row(json!({}))), "");
    }

    #[test]
    fn test_normalize_role() {
        assert_eq!(normalize_role(" ADMIN "), "admin");
        assert_eq!(normalize_role("manager"), "user");
        assert_eq!(normalize_role(""), "user");
    }

    #[test]
    fn test_cell_accepts_numbers() {
        let r = row(json!({ "password": 123456 }));
        assert_eq!(cell(&r, "password"), "123456");
        assert_eq!(cell(&r, "email"), "");
    }
}
