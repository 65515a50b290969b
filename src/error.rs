//! Crate-level error taxonomy.
//!
//! Module errors (`ReadarrError`, `StoreError`, `AuthError`) fold into
//! [`Error`], which the API maps onto HTTP status codes.

use thiserror::Error;

use crate::auth::AuthError;
use crate::model::RequestStatus;
use crate::readarr::ReadarrError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("A search query is required.")]
    InvalidQuery,

    #[error("Cannot move request from {from} to {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("This book is already in your library.")]
    DuplicateBook(String),

    #[error("You already have a pending request for this book")]
    DuplicateRequest,

    #[error("Book {0} still has requests")]
    BookInUse(i64),

    #[error("A library sync is already running")]
    SyncInProgress,

    #[error("Readarr unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Readarr rejected the request ({status}): {body}")]
    UpstreamRejected { status: u16, body: String },

    #[error("Book has no resolved author in Readarr; cannot add it")]
    MissingAuthorMetadata,

    #[error("Storage error: {0}")]
    Store(StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<ReadarrError> for Error {
    fn from(e: ReadarrError) -> Self {
        match e {
            ReadarrError::InvalidQuery => Error::InvalidQuery,
            ReadarrError::NotFound(id) => Error::NotFound(format!("Readarr book {}", id)),
            ReadarrError::MissingAuthorMetadata => Error::MissingAuthorMetadata,
            ReadarrError::Rejected { status, body } => Error::UpstreamRejected { status, body },
            ReadarrError::Unavailable(reason) => Error::UpstreamUnavailable(reason),
        }
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateForeignId(id) => Error::DuplicateBook(id),
            StoreError::BookInUse(id) => Error::BookInUse(id),
            StoreError::DuplicatePendingRequest { .. } => Error::DuplicateRequest,
            StoreError::UserConflict(reason) => Error::InvalidInput(reason),
            other => Error::Store(other),
        }
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidToken(_) | AuthError::InvalidCredentials => Error::Unauthenticated,
            AuthError::Hash(reason) | AuthError::Token(reason) => Error::Internal(reason),
        }
    }
}
