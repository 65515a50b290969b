use chrono::Utc;
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{constraint_code, parse_column, LibraryStore, Result, StoreError};
use crate::model::{Book, BookStatus, NewBook};

const BOOK_COLUMNS: &str =
    "id, title, author, status, foreign_book_id, image_url, created_at, updated_at";

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get("id")?,
        title: row.get("title")?,
        author: row.get("author")?,
        status: parse_column(row, "status")?,
        foreign_book_id: row.get("foreign_book_id")?,
        image_url: row.get("image_url")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn get_book(conn: &Connection, id: i64) -> rusqlite::Result<Option<Book>> {
    conn.query_row(
        &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
        params![id],
        book_from_row,
    )
    .optional()
}

impl LibraryStore {
    /// Insert a book. A taken `foreign_book_id` is reported as
    /// [`StoreError::DuplicateForeignId`], never as a second row.
    pub fn create_book(&self, book: NewBook) -> Result<Book> {
        let conn = self.conn()?;
        let now = Utc::now();

        let inserted = conn.execute(
            "INSERT INTO books (title, author, status, foreign_book_id, image_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                book.title,
                book.author,
                book.status.as_str(),
                book.foreign_book_id,
                book.image_url,
                now,
            ],
        );

        if let Err(e) = inserted {
            return Err(match (constraint_code(&e), book.foreign_book_id) {
                (Some(ffi::SQLITE_CONSTRAINT_UNIQUE), Some(foreign_id)) => {
                    StoreError::DuplicateForeignId(foreign_id)
                }
                _ => e.into(),
            });
        }

        let id = conn.last_insert_rowid();
        debug!(book_id = id, "Created book");

        get_book(&conn, id)?.ok_or(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_book(&self, id: i64) -> Result<Option<Book>> {
        let conn = self.conn()?;
        Ok(get_book(&conn, id)?)
    }

    pub fn get_book_by_foreign_id(&self, foreign_id: &str) -> Result<Option<Book>> {
        let conn = self.conn()?;
        let book = conn
            .query_row(
                &format!("SELECT {BOOK_COLUMNS} FROM books WHERE foreign_book_id = ?1"),
                params![foreign_id],
                book_from_row,
            )
            .optional()?;
        Ok(book)
    }

    /// All books, newest first.
    pub fn list_books(&self) -> Result<Vec<Book>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY created_at DESC, id DESC"
        ))?;
        let books = stmt
            .query_map([], book_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(books)
    }

    /// Set a book's status. Returns `None` if the book does not exist.
    pub fn update_book_status(&self, id: i64, status: BookStatus) -> Result<Option<Book>> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE books SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), Utc::now(), id],
        )?;

        if changed == 0 {
            return Ok(None);
        }

        Ok(get_book(&conn, id)?)
    }

    /// Delete a book. Returns `false` if it did not exist; refuses with
    /// [`StoreError::BookInUse`] while requests still reference it.
    pub fn delete_book(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;

        let references: i64 = conn.query_row(
            "SELECT COUNT(*) FROM requests WHERE book_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if references > 0 {
            return Err(StoreError::BookInUse(id));
        }

        match conn.execute("DELETE FROM books WHERE id = ?1", params![id]) {
            Ok(changed) => Ok(changed > 0),
            Err(e) if constraint_code(&e) == Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                Err(StoreError::BookInUse(id))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn count_books(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_book(title: &str, foreign_id: Option<&str>) -> NewBook {
        NewBook {
            title: title.to_string(),
            author: "Frank Herbert".to_string(),
            status: BookStatus::Wanted,
            foreign_book_id: foreign_id.map(str::to_string),
            image_url: None,
        }
    }

    #[test]
    fn test_create_and_lookup_by_foreign_id() {
        let store = LibraryStore::open_in_memory().unwrap();

        let book = store.create_book(new_book("Dune", Some("42"))).unwrap();
        assert_eq!(book.status, BookStatus::Wanted);
        assert_eq!(book.foreign_book_id.as_deref(), Some("42"));

        let found = store.get_book_by_foreign_id("42").unwrap().unwrap();
        assert_eq!(found.id, book.id);
        assert!(store.get_book_by_foreign_id("43").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_foreign_id_rejected() {
        let store = LibraryStore::open_in_memory().unwrap();

        store.create_book(new_book("Dune", Some("42"))).unwrap();
        let err = store.create_book(new_book("Dune again", Some("42"))).unwrap_err();

        assert!(matches!(err, StoreError::DuplicateForeignId(ref id) if id == "42"));
        assert_eq!(store.count_books().unwrap(), 1);
    }

    #[test]
    fn test_many_books_without_foreign_id() {
        let store = LibraryStore::open_in_memory().unwrap();

        store.create_book(new_book("One", None)).unwrap();
        store.create_book(new_book("Two", None)).unwrap();

        let books = store.list_books().unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].title, "Two");
    }

    #[test]
    fn test_update_status() {
        let store = LibraryStore::open_in_memory().unwrap();
        let book = store.create_book(new_book("Dune", None)).unwrap();

        let updated = store
            .update_book_status(book.id, BookStatus::Reading)
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, BookStatus::Reading);

        assert!(store.update_book_status(999, BookStatus::Read).unwrap().is_none());
    }

    #[test]
    fn test_delete_book() {
        let store = LibraryStore::open_in_memory().unwrap();
        let book = store.create_book(new_book("Dune", None)).unwrap();

        assert!(store.delete_book(book.id).unwrap());
        assert!(!store.delete_book(book.id).unwrap());
        assert!(store.get_book(book.id).unwrap().is_none());
    }
}
