//! Book request lifecycle.
//!
//! A request starts `Pending` and only an admin can move it forward:
//!
//! ```text
//! pending ──► approved ──► completed
//!    │           │
//!    │           └──► failed ──► approved (retry)
//!    └──► rejected
//! ```
//!
//! `Rejected` and `Completed` are terminal. Re-applying the current
//! status is always allowed and only refreshes its timestamp.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Book;

/// Status of a book request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Waiting for an admin decision.
    Pending,

    /// Accepted by an admin, waiting for delivery.
    Approved,

    /// Declined by an admin.
    Rejected,

    /// Delivered. Older clients call this `fulfilled`.
    #[serde(alias = "fulfilled")]
    Completed,

    /// Delivery failed upstream; may be approved again.
    Failed,
}

impl Default for RequestStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 5] = [
        RequestStatus::Pending,
        RequestStatus::Approved,
        RequestStatus::Rejected,
        RequestStatus::Completed,
        RequestStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Completed => "completed",
            RequestStatus::Failed => "failed",
        }
    }

    /// No transition leaves a terminal status except to itself.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Rejected | RequestStatus::Completed)
    }

    /// Whether `self -> next` is a legal move.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;

        if *self == next {
            return true;
        }

        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Completed)
                | (Approved, Failed)
                | (Failed, Approved)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            "completed" | "fulfilled" => Ok(RequestStatus::Completed),
            "failed" => Ok(RequestStatus::Failed),
            other => Err(format!("Invalid request status: {}", other)),
        }
    }
}

/// A user's ask to obtain a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRequest {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub status: RequestStatus,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,

    /// Admin who made the most recent transition.
    pub approved_by: Option<i64>,

    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl BookRequest {
    /// Apply a status change in memory, stamping actor and time.
    ///
    /// Callers must have checked `can_transition_to` first; the store
    /// persists the result as a single update.
    pub fn apply(
        &mut self,
        next: RequestStatus,
        actor_id: i64,
        rejection_reason: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.status = next;
        self.approved_by = Some(actor_id);
        self.updated_at = now;

        match next {
            RequestStatus::Pending | RequestStatus::Failed => {}
            RequestStatus::Approved => self.approved_at = Some(now),
            RequestStatus::Rejected => {
                self.rejected_at = Some(now);
                if rejection_reason.is_some() {
                    self.rejection_reason = rejection_reason;
                }
            }
            RequestStatus::Completed => self.completed_at = Some(now),
        }
    }
}

/// Book fields shown next to a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookSummary {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub image_url: Option<String>,
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
            image_url: book.image_url.clone(),
        }
    }
}

/// A request joined with its book, as listed to clients.
#[derive(Debug, Clone, Serialize)]
pub struct RequestWithBook {
    #[serde(flatten)]
    pub request: BookRequest,
    pub book: Option<BookSummary>,
}

/// Narrowing applied when listing requests.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub user_id: Option<i64>,
    pub status: Option<RequestStatus>,
}
