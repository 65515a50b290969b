//! Session extractors.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::api::ApiState;
use crate::error::Error;
use crate::model::User;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "token";

/// The logged-in user.
pub struct CurrentUser(pub User);

/// The logged-in user, who must be an admin.
pub struct AdminUser(pub User);

/// Session token from the `token` cookie, else a Bearer header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
        });

    from_cookie.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    })
}

pub fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite=Strict",
        SESSION_COOKIE, token, max_age_secs
    )
}

pub fn cleared_cookie() -> String {
    format!("{}=; HttpOnly; Path=/; Max-Age=0; SameSite=Strict", SESSION_COOKIE)
}

#[axum::async_trait]
impl FromRequestParts<Arc<ApiState>> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<ApiState>) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(Error::Unauthenticated)?;
        let user = state.auth.authenticate_token(&state.store, &token)?;
        Ok(CurrentUser(user))
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<ApiState>> for AdminUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<ApiState>) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(Error::Forbidden("Admin access required".into()));
        }
        Ok(AdminUser(user))
    }
}
