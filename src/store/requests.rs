use chrono::{DateTime, Utc};
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{constraint_code, parse_column, LibraryStore, Result, StoreError};
use crate::model::{BookRequest, BookSummary, RequestFilter, RequestStatus, RequestWithBook};

const REQUEST_COLUMNS: &str = "r.id, r.user_id, r.book_id, r.status, r.notes, r.rejection_reason, \
     r.approved_by, r.requested_at, r.approved_at, r.rejected_at, r.completed_at, r.updated_at";

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<BookRequest> {
    Ok(BookRequest {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        book_id: row.get("book_id")?,
        status: parse_column(row, "status")?,
        notes: row.get("notes")?,
        rejection_reason: row.get("rejection_reason")?,
        approved_by: row.get("approved_by")?,
        requested_at: row.get("requested_at")?,
        approved_at: row.get("approved_at")?,
        rejected_at: row.get("rejected_at")?,
        completed_at: row.get("completed_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn joined_from_row(row: &Row<'_>) -> rusqlite::Result<RequestWithBook> {
    let request = request_from_row(row)?;
    let book = match row.get::<_, Option<String>>("book_title")? {
        Some(title) => Some(BookSummary {
            id: request.book_id,
            title,
            author: row.get("book_author")?,
            image_url: row.get("book_image_url")?,
        }),
        None => None,
    };

    Ok(RequestWithBook { request, book })
}

fn get_request(conn: &Connection, id: i64) -> rusqlite::Result<Option<BookRequest>> {
    conn.query_row(
        &format!("SELECT {REQUEST_COLUMNS} FROM requests r WHERE r.id = ?1"),
        params![id],
        request_from_row,
    )
    .optional()
}

impl LibraryStore {
    /// Insert a new pending request stamped with `requested_at`. A user
    /// holds at most one pending request per book.
    pub fn create_request(
        &self,
        user_id: i64,
        book_id: i64,
        notes: Option<String>,
        requested_at: DateTime<Utc>,
    ) -> Result<BookRequest> {
        let conn = self.conn()?;

        let inserted = conn.execute(
            "INSERT INTO requests (user_id, book_id, status, notes, requested_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                user_id,
                book_id,
                RequestStatus::Pending.as_str(),
                notes,
                requested_at,
            ],
        );

        if let Err(e) = inserted {
            return Err(match constraint_code(&e) {
                Some(ffi::SQLITE_CONSTRAINT_UNIQUE) => {
                    StoreError::DuplicatePendingRequest { user_id, book_id }
                }
                _ => e.into(),
            });
        }

        let id = conn.last_insert_rowid();
        debug!(request_id = id, user_id, book_id, "Created request");

        get_request(&conn, id)?.ok_or(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_request(&self, id: i64) -> Result<Option<BookRequest>> {
        let conn = self.conn()?;
        Ok(get_request(&conn, id)?)
    }

    /// Requests matching `filter`, newest first, each with its book.
    pub fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<RequestWithBook>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REQUEST_COLUMNS},
                    b.title AS book_title, b.author AS book_author, b.image_url AS book_image_url
             FROM requests r
             LEFT JOIN books b ON b.id = r.book_id
             WHERE (?1 IS NULL OR r.user_id = ?1)
               AND (?2 IS NULL OR r.status = ?2)
             ORDER BY r.requested_at DESC, r.id DESC"
        ))?;

        let requests = stmt
            .query_map(
                params![filter.user_id, filter.status.map(|s| s.as_str())],
                joined_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(requests)
    }

    /// Persist every mutable field of `request` in one statement.
    pub fn save_request(&self, request: &BookRequest) -> Result<Option<BookRequest>> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE requests SET
                status = ?1, notes = ?2, rejection_reason = ?3, approved_by = ?4,
                approved_at = ?5, rejected_at = ?6, completed_at = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                request.status.as_str(),
                request.notes,
                request.rejection_reason,
                request.approved_by,
                request.approved_at,
                request.rejected_at,
                request.completed_at,
                request.updated_at,
                request.id,
            ],
        )?;

        if changed == 0 {
            return Ok(None);
        }

        Ok(get_request(&conn, request.id)?)
    }

    /// Returns `false` if the request did not exist.
    pub fn delete_request(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM requests WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    pub fn count_requests(&self, status: Option<RequestStatus>) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM requests WHERE (?1 IS NULL OR status = ?1)",
            params![status.map(|s| s.as_str())],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewBook, NewUser, Role};

    fn seed(store: &LibraryStore) -> (i64, i64) {
        let user = store
            .create_user(NewUser {
                username: "reader".into(),
                email: "reader@example.com".into(),
                role: Role::User,
                ..Default::default()
            })
            .unwrap();
        let book = store
            .create_book(NewBook {
                title: "Dune".into(),
                author: "Frank Herbert".into(),
                ..Default::default()
            })
            .unwrap();
        (user.id, book.id)
    }

    #[test]
    fn test_create_request_is_pending() {
        let store = LibraryStore::open_in_memory().unwrap();
        let (user_id, book_id) = seed(&store);
        let now = Utc::now();

        let request = store
            .create_request(user_id, book_id, Some("please".into()), now)
            .unwrap();

        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.requested_at, now);
        assert_eq!(request.notes.as_deref(), Some("please"));
    }

    #[test]
    fn test_second_pending_request_for_same_book_rejected() {
        let store = LibraryStore::open_in_memory().unwrap();
        let (user_id, book_id) = seed(&store);
        let mut first = store.create_request(user_id, book_id, None, Utc::now()).unwrap();

        assert!(matches!(
            store.create_request(user_id, book_id, None, Utc::now()).unwrap_err(),
            StoreError::DuplicatePendingRequest { user_id: u, book_id: b } if u == user_id && b == book_id
        ));
        assert_eq!(store.count_requests(None).unwrap(), 1);

        // Once decided, the book can be asked for again.
        first.apply(RequestStatus::Rejected, user_id, None, Utc::now());
        store.save_request(&first).unwrap().unwrap();
        assert!(store.create_request(user_id, book_id, None, Utc::now()).is_ok());
    }

    #[test]
    fn test_concurrent_creates_leave_one_pending() {
        use std::sync::{Arc, Barrier};

        let store = Arc::new(LibraryStore::open_in_memory().unwrap());
        let (user_id, book_id) = seed(&store);

        for _ in 0..50 {
            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let store = store.clone();
                    let barrier = barrier.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        store.create_request(user_id, book_id, None, Utc::now())
                    })
                })
                .collect();

            let created: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            assert_eq!(created.iter().filter(|r| r.is_ok()).count(), 1);
            assert_eq!(store.count_requests(Some(RequestStatus::Pending)).unwrap(), 1);

            let pending = created.into_iter().find_map(|r| r.ok()).unwrap();
            assert!(store.delete_request(pending.id).unwrap());
        }
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let store = LibraryStore::open_in_memory().unwrap();
        let (user_id, _) = seed(&store);

        let err = store.create_request(user_id, 999, None, Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }

    #[test]
    fn test_book_with_requests_cannot_be_deleted() {
        let store = LibraryStore::open_in_memory().unwrap();
        let (user_id, book_id) = seed(&store);
        let request = store.create_request(user_id, book_id, None, Utc::now()).unwrap();

        assert!(matches!(
            store.delete_book(book_id).unwrap_err(),
            StoreError::BookInUse(id) if id == book_id
        ));

        assert!(store.delete_request(request.id).unwrap());
        assert!(store.delete_book(book_id).unwrap());
    }

    #[test]
    fn test_list_filters_and_joins_book() {
        let store = LibraryStore::open_in_memory().unwrap();
        let (user_id, book_id) = seed(&store);
        let mut request = store.create_request(user_id, book_id, None, Utc::now()).unwrap();
        request.apply(RequestStatus::Approved, user_id, None, Utc::now());
        store.save_request(&request).unwrap().unwrap();

        store.create_request(user_id, book_id, None, Utc::now()).unwrap();

        let all = store.list_requests(&RequestFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].book.as_ref().unwrap().title, "Dune");

        let approved = store
            .list_requests(&RequestFilter {
                status: Some(RequestStatus::Approved),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].request.id, request.id);

        let other_user = store
            .list_requests(&RequestFilter {
                user_id: Some(user_id + 100),
                ..Default::default()
            })
            .unwrap();
        assert!(other_user.is_empty());

        assert_eq!(store.count_requests(Some(RequestStatus::Pending)).unwrap(), 1);
        assert_eq!(store.count_requests(None).unwrap(), 2);
    }
}
