//! Application state container shared across Axum route handlers and services.
//!
//! This struct holds shared resources such as the database connection and the
//! injected collaborator implementations (evidence store, notification sink).
//! It is cheap to clone and passed into route handlers via Axum's `State<T>`
//! extractor.

use crate::evidence::EvidenceStore;
use crate::notifications::NotificationSink;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Central application state shared across the server.
///
/// This includes:
/// - A cloned, thread-safe database connection for use with SeaORM.
/// - The evidence blob store used by the leave workflow.
/// - The notification sink events are published to.
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    evidence: Arc<dyn EvidenceStore>,
    notifier: Arc<dyn NotificationSink>,
}

impl AppState {
    /// Creates a new `AppState` from the connection and collaborator implementations.
    pub fn new(
        db: DatabaseConnection,
        evidence: Arc<dyn EvidenceStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            db,
            evidence,
            notifier,
        }
    }

    /// Returns a shared reference to the internal `DatabaseConnection`.
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Returns a cloned copy of the database connection.
    ///
    /// Useful for async contexts or spawned tasks that require ownership.
    pub fn db_clone(&self) -> DatabaseConnection {
        self.db.clone()
    }

    /// Returns the evidence store.
    pub fn evidence(&self) -> &Arc<dyn EvidenceStore> {
        &self.evidence
    }

    /// Returns the notification sink.
    pub fn notifier(&self) -> &Arc<dyn NotificationSink> {
        &self.notifier
    }
}
