//! Readarr search and add handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::{ApiJson, ApiQuery, ApiResponse, ApiResult, ApiState, CurrentUser};
use crate::error::{Error, Result};
use crate::linking;
use crate::model::Book;
use crate::readarr::Candidate;

#[derive(Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

#[derive(Deserialize)]
pub struct DetailsParams {
    #[serde(rename = "foreignBookId")]
    pub foreign_book_id: Option<String>,
}

/// Search Readarr by title or author.
pub async fn search(
    State(state): State<Arc<ApiState>>,
    _user: CurrentUser,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> ApiResult<Vec<Candidate>> {
    let query = params.query.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(Error::InvalidQuery);
    }

    let results = state.readarr.lookup(&query).await?;
    Ok(ApiResponse::ok(results))
}

/// Detailed Readarr record for one Goodreads id.
pub async fn book_details(
    State(state): State<Arc<ApiState>>,
    _user: CurrentUser,
    ApiQuery(params): ApiQuery<DetailsParams>,
) -> ApiResult<Candidate> {
    let foreign_id = params
        .foreign_book_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::InvalidInput("foreignBookId is required".into()))?;

    let details = state.readarr.lookup_details(&foreign_id).await?;
    Ok(ApiResponse::ok(details))
}

/// Add a picked candidate to Readarr and the local library.
pub async fn add_book(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user): CurrentUser,
    ApiJson(candidate): ApiJson<Candidate>,
) -> Result<(StatusCode, Json<ApiResponse<Book>>)> {
    let book = linking::link_or_create(
        &state.store,
        &state.readarr,
        &state.notifier,
        &candidate,
        user.id,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(book, "Book added to Readarr"),
    ))
}
