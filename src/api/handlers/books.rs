//! Local book handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::api::{ApiJson, ApiPath, ApiResponse, ApiResult, ApiState, CurrentUser};
use crate::error::{Error, Result};
use crate::model::{Book, BookStatus, NewBook};

#[derive(Deserialize)]
pub struct CreateBookBody {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub author: String,

    #[serde(default, alias = "foreignBookId")]
    pub foreign_book_id: Option<String>,

    #[serde(default, alias = "imageUrl")]
    pub image_url: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateBookBody {
    pub status: String,
}

pub async fn list_books(
    State(state): State<Arc<ApiState>>,
    _user: CurrentUser,
) -> ApiResult<Vec<Book>> {
    Ok(ApiResponse::ok(state.store.list_books()?))
}

/// Track a book by hand, without going through Readarr.
pub async fn create_book(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<CreateBookBody>,
) -> Result<(StatusCode, Json<ApiResponse<Book>>)> {
    let title = body.title.trim();
    let author = body.author.trim();
    if title.is_empty() || author.is_empty() {
        return Err(Error::InvalidInput("Title and author are required".into()));
    }

    let book = state.store.create_book(NewBook {
        title: title.to_string(),
        author: author.to_string(),
        status: BookStatus::Wanted,
        foreign_book_id: body
            .foreign_book_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty()),
        image_url: body.image_url.filter(|url| !url.trim().is_empty()),
    })?;

    info!(book_id = book.id, user_id = user.id, title = %book.title, "Book added manually");
    Ok((StatusCode::CREATED, ApiResponse::ok(book)))
}

pub async fn update_book(
    State(state): State<Arc<ApiState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateBookBody>,
) -> ApiResult<Book> {
    let status: BookStatus = body
        .status
        .trim()
        .to_lowercase()
        .parse()
        .map_err(Error::InvalidInput)?;

    if !status.is_user_settable() {
        return Err(Error::InvalidInput(format!(
            "Status {} is managed by sync",
            status
        )));
    }

    let book = state
        .store
        .update_book_status(id, status)?
        .ok_or_else(|| Error::NotFound(format!("Book {}", id)))?;

    Ok(ApiResponse::ok(book))
}

pub async fn delete_book(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<()> {
    if !state.store.delete_book(id)? {
        return Err(Error::NotFound(format!("Book {}", id)));
    }

    info!(book_id = id, user_id = user.id, "Book deleted");
    Ok(ApiResponse::message("Book deleted"))
}
