//! Local catalog entries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder stored when upstream has no usable author name.
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Placeholder stored when upstream has no title.
pub const UNKNOWN_TITLE: &str = "Unknown";

/// Status of a local book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Wanted,
    Reading,
    Read,
    Skipped,

    /// Readarr has grabbed a release. Set by sync only.
    Downloading,

    /// Readarr knows the book but does not monitor it. Set by sync only.
    Unmonitored,
}

impl Default for BookStatus {
    fn default() -> Self {
        Self::Wanted
    }
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Wanted => "wanted",
            BookStatus::Reading => "reading",
            BookStatus::Read => "read",
            BookStatus::Skipped => "skipped",
            BookStatus::Downloading => "downloading",
            BookStatus::Unmonitored => "unmonitored",
        }
    }

    /// Statuses a user may pick by hand.
    pub fn is_user_settable(&self) -> bool {
        matches!(
            self,
            BookStatus::Wanted | BookStatus::Reading | BookStatus::Read | BookStatus::Skipped
        )
    }

    /// Status implied by Readarr's flags for a book we already track.
    pub fn from_upstream(grabbed: bool, monitored: bool) -> Self {
        if grabbed {
            BookStatus::Downloading
        } else if monitored {
            BookStatus::Wanted
        } else {
            BookStatus::Unmonitored
        }
    }

    /// Status for a book first seen during sync.
    pub fn for_new_upstream(grabbed: bool) -> Self {
        if grabbed {
            BookStatus::Downloading
        } else {
            BookStatus::Wanted
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wanted" => Ok(BookStatus::Wanted),
            "reading" => Ok(BookStatus::Reading),
            "read" => Ok(BookStatus::Read),
            "skipped" => Ok(BookStatus::Skipped),
            "downloading" => Ok(BookStatus::Downloading),
            "unmonitored" => Ok(BookStatus::Unmonitored),
            other => Err(format!("Invalid book status: {}", other)),
        }
    }
}

/// A book tracked locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub status: BookStatus,

    /// Readarr's stable identifier. Unique when present.
    pub foreign_book_id: Option<String>,

    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting a book.
#[derive(Debug, Clone, Default)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub status: BookStatus,
    pub foreign_book_id: Option<String>,
    pub image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_upstream_flags() {
        assert_eq!(BookStatus::from_upstream(true, true), BookStatus::Downloading);
        assert_eq!(BookStatus::from_upstream(true, false), BookStatus::Downloading);
        assert_eq!(BookStatus::from_upstream(false, true), BookStatus::Wanted);
        assert_eq!(BookStatus::from_upstream(false, false), BookStatus::Unmonitored);

        assert_eq!(BookStatus::for_new_upstream(false), BookStatus::Wanted);
        assert_eq!(BookStatus::for_new_upstream(true), BookStatus::Downloading);
    }

    #[test]
    fn test_user_settable() {
        assert!(BookStatus::Read.is_user_settable());
        assert!(!BookStatus::Downloading.is_user_settable());
        assert!(!BookStatus::Unmonitored.is_user_settable());
    }

    #[test]
    fn test_parse_round_trip() {
        for s in ["wanted", "reading", "read", "skipped", "downloading", "unmonitored"] {
            assert_eq!(s.parse::<BookStatus>().unwrap().as_str(), s);
        }
        assert!("archived".parse::<BookStatus>().is_err());
    }
}
