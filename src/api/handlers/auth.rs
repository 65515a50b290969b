//! Session handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::api::extract::{cleared_cookie, session_cookie};
use crate::api::{ApiJson, ApiResponse, ApiResult, ApiState, CurrentUser};
use crate::error::{Error, Result};
use crate::model::User;

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,
}

/// Check credentials and set the session cookie.
pub async fn login(
    State(state): State<Arc<ApiState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Response> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(Error::InvalidInput("Username and password are required".into()));
    }

    // Password verification blocks.
    let store = state.store.clone();
    let user = tokio::task::spawn_blocking(move || {
        crate::auth::login(&store, &req.username, &req.password)
    })
    .await
    .map_err(|e| Error::Internal(e.to_string()))??;

    let token = state.auth.issue_token(&user)?;
    let cookie = session_cookie(&token, state.auth.ttl_secs());

    Ok((
        [(SET_COOKIE, cookie)],
        ApiResponse::with_message(user, "Logged in"),
    )
        .into_response())
}

pub async fn logout() -> Response {
    (
        [(SET_COOKIE, cleared_cookie())],
        ApiResponse::message("Logged out"),
    )
        .into_response()
}

pub async fn me(CurrentUser(user): CurrentUser) -> ApiResult<User> {
    Ok(ApiResponse::ok(user))
}
