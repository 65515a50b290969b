//! Local SQLite store for users, books and requests.
//!
//! The store is the single owner of durable state. One connection sits
//! behind a mutex; every method locks, runs its statements and returns
//! owned values, so no lock is ever held across an `.await`.

mod books;
mod requests;
mod users;

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, Row};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur in store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("A book with foreign id {0} already exists")]
    DuplicateForeignId(String),

    #[error("Book {0} is referenced by requests")]
    BookInUse(i64),

    #[error("User {user_id} already has a pending request for book {book_id}")]
    DuplicatePendingRequest { user_id: i64, book_id: i64 },

    #[error("{0}")]
    UserConflict(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT,
    role          TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('admin', 'user')),
    avatar        TEXT,
    permissions   TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS books (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    title           TEXT NOT NULL,
    author          TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'wanted',
    foreign_book_id TEXT,
    image_url       TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_books_foreign_book_id
    ON books (foreign_book_id) WHERE foreign_book_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS requests (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id          INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    book_id          INTEGER NOT NULL REFERENCES books (id) ON DELETE RESTRICT,
    status           TEXT NOT NULL DEFAULT 'pending'
                     CHECK (status IN ('pending', 'approved', 'rejected', 'completed', 'failed')),
    notes            TEXT,
    rejection_reason TEXT,
    approved_by      INTEGER REFERENCES users (id) ON DELETE SET NULL,
    requested_at     TEXT NOT NULL,
    approved_at      TEXT,
    rejected_at      TEXT,
    completed_at     TEXT,
    updated_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_requests_user ON requests (user_id);
CREATE INDEX IF NOT EXISTS idx_requests_book ON requests (book_id);

CREATE UNIQUE INDEX IF NOT EXISTS idx_requests_one_pending
    ON requests (user_id, book_id) WHERE status = 'pending';
"#;

/// Local store backed by SQLite.
pub struct LibraryStore {
    conn: Mutex<Connection>,
}

impl LibraryStore {
    /// Open or create the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let store = Self::init(conn)?;
        info!(path = %path.display(), "Library store opened");
        Ok(store)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        debug!("Schema ready");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

/// Read a text column into one of the domain enums.
fn parse_column<T>(row: &Row<'_>, name: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let idx = row.as_ref().column_index(name)?;
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Extended result code of a failed constraint, if that is what `e` is.
fn constraint_code(e: &rusqlite::Error) -> Option<i32> {
    match e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            Some(err.extended_code)
        }
        _ => None,
    }
}
