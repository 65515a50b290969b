//! Domain types shared by the store, the services and the API.

pub mod book;
pub mod request;
pub mod user;

pub use book::{Book, BookStatus, NewBook, UNKNOWN_AUTHOR, UNKNOWN_TITLE};
pub use request::{BookRequest, BookSummary, RequestFilter, RequestStatus, RequestWithBook};
pub use user::{NewUser, Role, User, UserUpdate};
