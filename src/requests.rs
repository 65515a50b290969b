//! Request workflow: who may create, read, move and delete requests.
//!
//! Users own their requests. Only admins change status, and only along
//! the edges [`RequestStatus::can_transition_to`] allows.

use chrono::Utc;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::{BookRequest, BookSummary, RequestFilter, RequestStatus, RequestWithBook, User};
use crate::notify::{Audience, Level, Notification, NotificationKind, Notifier};
use crate::store::LibraryStore;

/// File a new pending request by `actor` for an existing book.
pub fn create(
    store: &LibraryStore,
    notifier: &Notifier,
    actor: &User,
    book_id: i64,
    notes: Option<String>,
) -> Result<BookRequest> {
    let book = store
        .get_book(book_id)?
        .ok_or_else(|| Error::NotFound(format!("Book {}", book_id)))?;

    let notes = notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let request = store.create_request(actor.id, book_id, notes, Utc::now())?;
    info!(request_id = request.id, user_id = actor.id, book_id, "Request created");

    notifier.publish(Notification::new(
        Audience::Admins,
        NotificationKind::RequestCreated,
        Level::Info,
        format!("{} requested \"{}\"", actor.username, book.title),
    ));

    Ok(request)
}

/// Move a request to `next`. Admin only.
pub fn transition(
    store: &LibraryStore,
    notifier: &Notifier,
    actor: &User,
    request_id: i64,
    next: RequestStatus,
    rejection_reason: Option<String>,
) -> Result<BookRequest> {
    if !actor.is_admin() {
        return Err(Error::Forbidden("Only admins can change request status".into()));
    }

    let mut request = store
        .get_request(request_id)?
        .ok_or_else(|| Error::NotFound(format!("Request {}", request_id)))?;

    let from = request.status;
    if !from.can_transition_to(next) {
        return Err(Error::InvalidTransition { from, to: next });
    }

    let rejection_reason = rejection_reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    request.apply(next, actor.id, rejection_reason, Utc::now());

    let saved = store
        .save_request(&request)?
        .ok_or_else(|| Error::NotFound(format!("Request {}", request_id)))?;

    info!(
        request_id,
        from = %from,
        to = %next,
        admin_id = actor.id,
        "Request status changed"
    );

    let level = match next {
        RequestStatus::Approved | RequestStatus::Completed => Level::Success,
        RequestStatus::Rejected | RequestStatus::Failed => Level::Error,
        RequestStatus::Pending => Level::Info,
    };
    notifier.publish(Notification::new(
        Audience::User(saved.user_id),
        NotificationKind::RequestStatusChanged,
        level,
        format!("Your request #{} is now {}", saved.id, next),
    ));

    Ok(saved)
}

/// One request with its book. Owner or admin.
pub fn get(store: &LibraryStore, actor: &User, request_id: i64) -> Result<RequestWithBook> {
    let request = store
        .get_request(request_id)?
        .ok_or_else(|| Error::NotFound(format!("Request {}", request_id)))?;

    if !actor.can_access(request.user_id) {
        return Err(Error::Forbidden("You can only view your own requests".into()));
    }

    let book = store.get_book(request.book_id)?.as_ref().map(BookSummary::from);
    Ok(RequestWithBook { request, book })
}

/// Requests visible to `actor`. Non-admins only ever see their own.
pub fn list(store: &LibraryStore, actor: &User, filter: RequestFilter) -> Result<Vec<RequestWithBook>> {
    let filter = if actor.is_admin() {
        filter
    } else {
        RequestFilter {
            user_id: Some(actor.id),
            ..filter
        }
    };

    Ok(store.list_requests(&filter)?)
}

/// Delete a request. Owner or admin.
pub fn delete(store: &LibraryStore, actor: &User, request_id: i64) -> Result<()> {
    let request = store
        .get_request(request_id)?
        .ok_or_else(|| Error::NotFound(format!("Request {}", request_id)))?;

    if !actor.can_access(request.user_id) {
        return Err(Error::Forbidden("You can only delete your own requests".into()));
    }

    if !store.delete_request(request_id)? {
        return Err(Error::NotFound(format!("Request {}", request_id)));
    }

    info!(request_id, user_id = actor.id, "Request deleted");
    Ok(())
}
