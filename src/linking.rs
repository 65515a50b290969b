//! Linking Readarr candidates to local books.
//!
//! A candidate is keyed locally by its Readarr id. The local row is only
//! written after Readarr accepted the add, so a failed add leaves no
//! trace here.

use tracing::info;

use crate::error::{Error, Result};
use crate::model::{Book, BookStatus, NewBook};
use crate::notify::{Audience, Level, Notification, NotificationKind, Notifier};
use crate::readarr::{Candidate, ReadarrClient};
use crate::store::LibraryStore;

/// Add `candidate` to Readarr and record it locally for `actor_id`.
pub async fn link_or_create(
    store: &LibraryStore,
    readarr: &ReadarrClient,
    notifier: &Notifier,
    candidate: &Candidate,
    actor_id: i64,
) -> Result<Book> {
    let key = candidate.local_key();

    if store.get_book_by_foreign_id(&key)?.is_some() {
        return Err(Error::DuplicateBook(key));
    }

    readarr.add_to_library(candidate).await?;

    let book = store.create_book(NewBook {
        title: candidate.title.clone(),
        author: candidate.author_name(),
        status: BookStatus::Wanted,
        foreign_book_id: Some(key),
        image_url: candidate.remote_cover.clone(),
    })?;

    info!(
        book_id = book.id,
        foreign_book_id = ?book.foreign_book_id,
        title = %book.title,
        "Book added to library"
    );

    notifier.publish(Notification::new(
        Audience::User(actor_id),
        NotificationKind::BookAdded,
        Level::Success,
        format!("\"{}\" was added to your library", book.title),
    ));

    Ok(book)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::UNKNOWN_AUTHOR;
    use crate::testing::MockReadarr;

    fn candidate(value: serde_json::Value) -> Candidate {
        serde_json::from_value(value).unwrap()
    }

    fn dune() -> Candidate {
        candidate(json!({
            "id": 42,
            "title": "Dune",
            "author": {"id": 7, "authorName": "Frank Herbert"},
            "remoteCover": "http://covers/dune.jpg"
        }))
    }

    #[tokio::test]
    async fn test_link_creates_wanted_book() {
        let mock = MockReadarr::start().await;
        let store = LibraryStore::open_in_memory().unwrap();
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();

        let book = link_or_create(&store, &mock.client(), &notifier, &dune(), 1)
            .await
            .unwrap();

        assert_eq!(book.status, BookStatus::Wanted);
        assert_eq!(book.foreign_book_id.as_deref(), Some("42"));
        assert_eq!(book.author, "Frank Herbert");
        assert_eq!(book.image_url.as_deref(), Some("http://covers/dune.jpg"));
        assert_eq!(mock.added().len(), 1);

        let note = rx.recv().await.unwrap();
        assert_eq!(note.kind, NotificationKind::BookAdded);
        assert_eq!(note.audience, Audience::User(1));
    }

    #[tokio::test]
    async fn test_second_link_is_duplicate_and_skips_upstream() {
        let mock = MockReadarr::start().await;
        let store = LibraryStore::open_in_memory().unwrap();
        let notifier = Notifier::default();
        let client = mock.client();

        link_or_create(&store, &client, &notifier, &dune(), 1).await.unwrap();
        let err = link_or_create(&store, &client, &notifier, &dune(), 1)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateBook(ref key) if key == "42"));
        assert_eq!(mock.added().len(), 1);
        assert_eq!(store.count_books().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rejected_add_writes_nothing() {
        let mock = MockReadarr::start().await;
        mock.reject_adds(400, "Invalid root folder");
        let store = LibraryStore::open_in_memory().unwrap();

        let err = link_or_create(&store, &mock.client(), &Notifier::default(), &dune(), 1)
            .await
            .unwrap_err();

        match err {
            Error::UpstreamRejected { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "Invalid root folder");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.count_books().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_author_id_writes_nothing() {
        let mock = MockReadarr::start().await;
        let store = LibraryStore::open_in_memory().unwrap();
        let orphan = candidate(json!({"id": 9, "title": "Orphan", "author": {"authorName": "Someone"}}));

        let err = link_or_create(&store, &mock.client(), &Notifier::default(), &orphan, 1)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingAuthorMetadata));
        assert!(mock.added().is_empty());
        assert_eq!(store.count_books().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_nameless_author_falls_back() {
        let mock = MockReadarr::start().await;
        let store = LibraryStore::open_in_memory().unwrap();
        let nameless = candidate(json!({"id": 10, "title": "Anonymous", "author": {"id": 3, "authorName": "  "}}));

        let book = link_or_create(&store, &mock.client(), &Notifier::default(), &nameless, 1)
            .await
            .unwrap();

        assert_eq!(book.author, UNKNOWN_AUTHOR);
    }

    #[tokio::test]
    async fn test_upstream_down_writes_nothing() {
        let mock = MockReadarr::start().await;
        mock.fail_with(502);
        let store = LibraryStore::open_in_memory().unwrap();

        let err = link_or_create(&store, &mock.client(), &Notifier::default(), &dune(), 1)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UpstreamRejected { status: 502, .. }));
        assert_eq!(store.count_books().unwrap(), 0);
    }
}
