use std::sync::Arc;

use challenge_core::Clock;
use challenge_core::model::{NotificationId, NotificationKind, UserId};
use storage::repository::{NewNotificationRecord, NotificationRepository, StorageError};

/// Inserts notifications stamped with the service clock.
#[derive(Clone)]
pub struct Notifier {
    clock: Clock,
    notifications: Arc<dyn NotificationRepository>,
}

impl Notifier {
    #[must_use]
    pub fn new(clock: Clock, notifications: Arc<dyn NotificationRepository>) -> Self {
        Self {
            clock,
            notifications,
        }
    }

    /// Insert one unread notification.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        message: String,
        kind: NotificationKind,
        related_id: Option<String>,
    ) -> Result<NotificationId, StorageError> {
        self.notifications
            .insert_notification(NewNotificationRecord {
                user_id,
                message,
                kind,
                related_id,
                created_at: self.clock.now(),
            })
            .await
    }

    /// Fan-out variant: a failed insert is logged and swallowed so the
    /// triggering mutation still succeeds.
    pub async fn send(
        &self,
        user_id: UserId,
        message: String,
        kind: NotificationKind,
        related_id: Option<String>,
    ) {
        if let Err(err) = self.create(user_id, message, kind, related_id).await {
            tracing::warn!(user = %user_id, kind = %kind, error = %err, "notification fan-out failed");
        }
    }
}
