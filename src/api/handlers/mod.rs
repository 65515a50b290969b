//! API request handlers.

pub mod auth;
pub mod books;
pub mod requests;
pub mod search;
pub mod status;
pub mod sync;
pub mod users;
pub mod websocket;
