//! Library reconciliation with Readarr.
//!
//! Walks Readarr's library once and brings local books in line with it.
//! Records are handled one by one; a bad record is counted as skipped
//! and never stops the walk. Only one run may be in flight.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::{BookStatus, NewBook};
use crate::notify::{Audience, Level, Notification, NotificationKind, Notifier};
use crate::readarr::{LibraryBook, LibraryEntry, ReadarrClient};
use crate::store::LibraryStore;

/// Counts from one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub total_books: usize,
    pub new_books_added: usize,
    pub books_updated: usize,
    pub skipped: usize,
}

enum Outcome {
    Added,
    Updated,
}

/// Runs syncs against one store and one Readarr.
pub struct Reconciler {
    store: Arc<LibraryStore>,
    readarr: ReadarrClient,
    notifier: Notifier,
    running: Mutex<()>,
}

impl Reconciler {
    pub fn new(store: Arc<LibraryStore>, readarr: ReadarrClient, notifier: Notifier) -> Self {
        Self {
            store,
            readarr,
            notifier,
            running: Mutex::new(()),
        }
    }

    /// Run one sync. Fails fast with [`Error::SyncInProgress`] if another
    /// run holds the lock.
    pub async fn run(&self) -> Result<SyncStats> {
        let _running = self.running.try_lock().map_err(|_| Error::SyncInProgress)?;

        info!(readarr = %self.readarr.base_url(), "Starting Readarr sync");
        let entries = self.readarr.list_library().await?;

        let mut stats = SyncStats {
            total_books: entries.len(),
            ..Default::default()
        };

        for entry in entries {
            let record = match entry {
                LibraryEntry::Book(record) => record,
                LibraryEntry::Malformed { reason } => {
                    warn!(reason = %reason, "Skipping malformed Readarr record");
                    stats.skipped += 1;
                    continue;
                }
            };

            match self.reconcile(&record) {
                Ok(Some(Outcome::Added)) => stats.new_books_added += 1,
                Ok(Some(Outcome::Updated)) => stats.books_updated += 1,
                Ok(None) => {
                    warn!(title = ?record.title, "Skipping Readarr record without an id");
                    stats.skipped += 1;
                }
                Err(e) => {
                    warn!(
                        readarr_id = ?record.id,
                        title = ?record.title,
                        error = %e,
                        "Failed to sync record"
                    );
                    stats.skipped += 1;
                }
            }
        }

        info!(
            total = stats.total_books,
            added = stats.new_books_added,
            updated = stats.books_updated,
            skipped = stats.skipped,
            "Readarr sync finished"
        );

        self.notifier.publish(Notification::new(
            Audience::Admins,
            NotificationKind::SyncCompleted,
            Level::Success,
            format!(
                "Sync complete: {} new, {} updated, {} skipped",
                stats.new_books_added, stats.books_updated, stats.skipped
            ),
        ));

        Ok(stats)
    }

    /// `None` when the record has no usable key.
    fn reconcile(&self, record: &LibraryBook) -> Result<Option<Outcome>> {
        let Some(key) = record.sync_key() else {
            return Ok(None);
        };

        let grabbed = record.is_grabbed();

        if let Some(existing) = self.store.get_book_by_foreign_id(&key)? {
            let status = BookStatus::from_upstream(grabbed, record.is_monitored());
            self.store
                .update_book_status(existing.id, status)?
                .ok_or_else(|| Error::NotFound(format!("Book {}", existing.id)))?;
            return Ok(Some(Outcome::Updated));
        }

        self.store.create_book(NewBook {
            title: record.title_or_unknown(),
            author: record.author_or_unknown(),
            status: BookStatus::for_new_upstream(grabbed),
            foreign_book_id: Some(key),
            image_url: record.remote_cover.clone(),
        })?;

        Ok(Some(Outcome::Added))
    }
}
