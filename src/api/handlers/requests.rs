//! Request workflow handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::{
    ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, ApiState, CurrentUser,
};
use crate::error::{Error, Result};
use crate::model::{BookRequest, RequestFilter, RequestStatus, RequestWithBook};
use crate::requests;

#[derive(Deserialize)]
pub struct ListParams {
    pub status: Option<String>,

    #[serde(alias = "userId")]
    pub user_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateRequestBody {
    #[serde(alias = "bookId")]
    pub book_id: i64,

    #[serde(default, alias = "message")]
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateRequestBody {
    pub status: String,

    #[serde(default, alias = "rejectionReason")]
    pub rejection_reason: Option<String>,
}

fn parse_status(raw: &str) -> Result<RequestStatus> {
    raw.trim().to_lowercase().parse().map_err(Error::InvalidInput)
}

pub async fn list_requests(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user): CurrentUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Vec<RequestWithBook>> {
    let status = params
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_status)
        .transpose()?;

    let filter = RequestFilter {
        user_id: params.user_id,
        status,
    };

    Ok(ApiResponse::ok(requests::list(&state.store, &user, filter)?))
}

pub async fn create_request(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<CreateRequestBody>,
) -> Result<(StatusCode, Json<ApiResponse<BookRequest>>)> {
    let request = requests::create(&state.store, &state.notifier, &user, body.book_id, body.notes)?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(request, "Request submitted"),
    ))
}

pub async fn get_request(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<RequestWithBook> {
    Ok(ApiResponse::ok(requests::get(&state.store, &user, id)?))
}

/// Approve, reject, complete or fail a request.
pub async fn update_request(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateRequestBody>,
) -> ApiResult<BookRequest> {
    if !user.is_admin() {
        return Err(Error::Forbidden("Only admins can change request status".into()));
    }

    let next = parse_status(&body.status)?;
    let request = requests::transition(
        &state.store,
        &state.notifier,
        &user,
        id,
        next,
        body.rejection_reason,
    )?;

    Ok(ApiResponse::with_message(
        request,
        format!("Request {}", next),
    ))
}

pub async fn delete_request(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<()> {
    requests::delete(&state.store, &user, id)?;
    Ok(ApiResponse::message("Request deleted"))
}
