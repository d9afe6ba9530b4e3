use challenge_core::model::{Notification, NotificationId, UserId};

use super::SqliteRepository;
use super::mapping::{
    db_err, map_notification_row, map_rows, notification_id_from_i64, notification_id_to_i64,
    user_id_to_i64,
};
use crate::repository::{NewNotificationRecord, NotificationRepository, StorageError};

const NOTIFICATION_COLUMNS: &str =
    "SELECT id, user_id, message, is_read, created_at, kind, related_id FROM notifications";

#[async_trait::async_trait]
impl NotificationRepository for SqliteRepository {
    async fn insert_notification(
        &self,
        notification: NewNotificationRecord,
    ) -> Result<NotificationId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO notifications (user_id, message, is_read, created_at, kind, related_id)
            VALUES (?1, ?2, 0, ?3, ?4, ?5)
            ",
        )
        .bind(user_id_to_i64(notification.user_id)?)
        .bind(notification.message)
        .bind(notification.created_at)
        .bind(notification.kind.as_str())
        .bind(notification.related_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        notification_id_from_i64(res.last_insert_rowid())
    }

    async fn get_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, StorageError> {
        let row = sqlx::query(&format!("{NOTIFICATION_COLUMNS} WHERE id = ?1"))
            .bind(notification_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_notification_row).transpose()
    }

    async fn notifications_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Notification>, StorageError> {
        let rows = sqlx::query(&format!(
            "{NOTIFICATION_COLUMNS} WHERE user_id = ?1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id_to_i64(user_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        map_rows(&rows, map_notification_row)
    }

    async fn unread_count(&self, user_id: UserId) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
        )
        .bind(user_id_to_i64(user_id)?)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        u64::try_from(count).map_err(|_| StorageError::Serialization("count sign overflow".into()))
    }

    async fn mark_read(&self, id: NotificationId) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?1")
            .bind(notification_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: UserId) -> Result<u64, StorageError> {
        let res =
            sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0")
                .bind(user_id_to_i64(user_id)?)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(res.rows_affected())
    }

    async fn delete_notification(&self, id: NotificationId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM notifications WHERE id = ?1")
            .bind(notification_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_all_for_user(&self, user_id: UserId) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM notifications WHERE user_id = ?1")
            .bind(user_id_to_i64(user_id)?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected())
    }
}
