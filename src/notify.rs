//! User-facing notifications.
//!
//! Services publish [`Notification`]s on a broadcast bus; each WebSocket
//! session subscribes and forwards the ones addressed to its user.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::model::User;

const DEFAULT_CAPACITY: usize = 64;

/// Who should see a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    User(i64),
    Admins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Error,
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookAdded,
    RequestCreated,
    RequestStatusChanged,
    SyncCompleted,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    #[serde(skip)]
    pub audience: Audience,

    #[serde(rename = "type")]
    pub kind: NotificationKind,

    pub level: Level,
    pub message: String,
}

impl Notification {
    pub fn new(
        audience: Audience,
        kind: NotificationKind,
        level: Level,
        message: impl Into<String>,
    ) -> Self {
        Self {
            audience,
            kind,
            level,
            message: message.into(),
        }
    }

    pub fn is_for(&self, user: &User) -> bool {
        match self.audience {
            Audience::User(id) => user.id == id,
            Audience::Admins => user.is_admin(),
        }
    }
}

/// Broadcast bus for notifications.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Send to every current subscriber. Nobody listening is fine.
    pub fn publish(&self, notification: Notification) {
        debug!(kind = ?notification.kind, audience = ?notification.audience, "Notification");
        let _ = self.tx.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}
