//! User administration handlers.

use std::sync::Arc;

use axum::extract::State;
use serde::Deserialize;
use tracing::info;

use crate::api::{AdminUser, ApiJson, ApiResponse, ApiResult, ApiState};
use crate::error::Error;
use crate::model::{Role, User, UserUpdate};

#[derive(Deserialize)]
pub struct UpdateUserBody {
    #[serde(alias = "userId")]
    pub user_id: i64,

    pub role: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
}

pub async fn list_users(
    State(state): State<Arc<ApiState>>,
    _admin: AdminUser,
) -> ApiResult<Vec<User>> {
    Ok(ApiResponse::ok(state.store.list_users()?))
}

/// Change a user's role, email or username.
pub async fn update_user(
    State(state): State<Arc<ApiState>>,
    AdminUser(admin): AdminUser,
    ApiJson(body): ApiJson<UpdateUserBody>,
) -> ApiResult<User> {
    let role = match body.role.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.to_lowercase().parse::<Role>().map_err(Error::InvalidInput)?),
    };

    let email = body
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());
    if let Some(email) = &email {
        if !email.contains('@') {
            return Err(Error::InvalidInput(format!("Invalid email: {}", email)));
        }
        if let Some(owner) = state.store.get_user_by_email(email)? {
            if owner.id != body.user_id {
                return Err(Error::InvalidInput(format!("Email {} is already in use", email)));
            }
        }
    }

    let username = body
        .username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    if let Some(username) = &username {
        if let Some(owner) = state.store.get_user_by_username(username)? {
            if owner.id != body.user_id {
                return Err(Error::InvalidInput(format!(
                    "Username {} is already in use",
                    username
                )));
            }
        }
    }

    let update = UserUpdate {
        username,
        email,
        role,
    };

    if update.is_empty() {
        return Err(Error::InvalidInput("No valid fields to update".into()));
    }

    let user = state
        .store
        .update_user(body.user_id, &update)?
        .ok_or_else(|| Error::NotFound(format!("User {}", body.user_id)))?;

    info!(user_id = user.id, admin_id = admin.id, role = %user.role, "User updated");
    Ok(ApiResponse::with_message(user, "User updated"))
}
