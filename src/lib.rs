//! Bookseerr - book requests in front of Readarr.
//!
//! Users search Readarr's catalog and add books or ask for them; admins
//! approve or reject the asks. Local state lives in SQLite and is kept
//! in line with Readarr by an on-demand sync.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          HTTP API                            │
//! │  sessions, search, requests, books, users, sync, WebSocket   │
//! └───────┬───────────────────┬───────────────────┬──────────────┘
//!         │                   │                   │
//! ┌───────┴───────┐   ┌───────┴───────┐   ┌───────┴───────┐
//! │    linking    │   │   requests    │   │     sync      │
//! │ add + record  │   │ state machine │   │  reconciler   │
//! └───┬───────┬───┘   └───────┬───────┘   └───┬───────┬───┘
//!     │       │               │               │       │
//!     │   ┌───┴───────────────┴───────────────┴───┐   │
//!     │   │            store (SQLite)             │   │
//!     │   └───────────────────────────────────────┘   │
//! ┌───┴───────────────────────────────────────────────┴───┐
//! │                 readarr (HTTP client)                 │
//! └───────────────────────────────────────────────────────┘
//! ```

/// Domain types.
pub mod model;

/// SQLite persistence.
pub mod store;

/// Readarr API client.
pub mod readarr;

/// Candidate to local book linking.
pub mod linking;

/// Request workflow.
pub mod requests;

/// Library reconciliation.
pub mod sync;

/// Passwords and session tokens.
pub mod auth;

/// Notification bus.
pub mod notify;

/// REST API.
pub mod api;

pub mod config;
pub mod error;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{Error, Result};
