//! Fire-and-forget notification delivery.
//!
//! The core signals domain events (e.g. a leave request was decided) through an
//! injected [`NotificationSink`]. Delivery is best-effort: a sink failure is the
//! sink's problem, never the triggering operation's. There is no process-wide
//! subscriber registry; whoever builds the `AppState` decides where events go.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// A domain event worth telling someone about.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    /// Event name, e.g. `leave_request.decided`.
    pub event: String,
    /// User the event concerns (recipient hint, not an address).
    pub user_id: i64,
    pub payload: Value,
}

impl Notification {
    pub fn new(event: impl Into<String>, user_id: i64, payload: Value) -> Self {
        Self {
            event: event.into(),
            user_id,
            payload,
        }
    }
}

/// Pluggable delivery backend. Implementations must not block the caller on
/// delivery outcome; `publish` returning is all the core waits for.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, notification: Notification);
}

/// Default sink: writes the event to the log and drops it.
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn publish(&self, notification: Notification) {
        tracing::info!(
            event = %notification.event,
            user_id = notification.user_id,
            payload = %notification.payload,
            "notification published"
        );
    }
}

/// Sink for tests: remembers everything it was given.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: tokio::sync::Mutex<Vec<Notification>>,
}

impl MemorySink {
    pub async fn drain(&self) -> Vec<Notification> {
        let mut guard = self.events.lock().await;
        std::mem::take(&mut *guard)
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    async fn publish(&self, notification: Notification) {
        self.events.lock().await.push(notification);
    }
}
