use challenge_core::model::{FriendRequest, FriendRequestId, Friendship, FriendshipId, UserId};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    db_err, friend_request_id_from_i64, friend_request_id_to_i64, friendship_id_from_i64,
    map_friend_request_row, map_friendship_row, map_rows, ser, user_id_to_i64,
};
use crate::repository::{FriendshipRepository, StorageError};

const REQUEST_COLUMNS: &str =
    "SELECT id, requester_id, recipient_id, created_at FROM friend_requests";

#[async_trait::async_trait]
impl FriendshipRepository for SqliteRepository {
    async fn insert_friend_request(
        &self,
        requester_id: UserId,
        recipient_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<FriendRequestId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO friend_requests (requester_id, recipient_id, created_at)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(user_id_to_i64(requester_id)?)
        .bind(user_id_to_i64(recipient_id)?)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        friend_request_id_from_i64(res.last_insert_rowid())
    }

    async fn get_friend_request(
        &self,
        id: FriendRequestId,
    ) -> Result<Option<FriendRequest>, StorageError> {
        let row = sqlx::query(&format!("{REQUEST_COLUMNS} WHERE id = ?1"))
            .bind(friend_request_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_friend_request_row).transpose()
    }

    async fn find_friend_request(
        &self,
        requester_id: UserId,
        recipient_id: UserId,
    ) -> Result<Option<FriendRequest>, StorageError> {
        let row = sqlx::query(&format!(
            "{REQUEST_COLUMNS} WHERE requester_id = ?1 AND recipient_id = ?2"
        ))
        .bind(user_id_to_i64(requester_id)?)
        .bind(user_id_to_i64(recipient_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_friend_request_row).transpose()
    }

    async fn requests_from(
        &self,
        requester_id: UserId,
    ) -> Result<Vec<FriendRequest>, StorageError> {
        let rows = sqlx::query(&format!(
            "{REQUEST_COLUMNS} WHERE requester_id = ?1 ORDER BY id ASC"
        ))
        .bind(user_id_to_i64(requester_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        map_rows(&rows, map_friend_request_row)
    }

    async fn requests_to(&self, recipient_id: UserId) -> Result<Vec<FriendRequest>, StorageError> {
        let rows = sqlx::query(&format!(
            "{REQUEST_COLUMNS} WHERE recipient_id = ?1 ORDER BY id ASC"
        ))
        .bind(user_id_to_i64(recipient_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        map_rows(&rows, map_friend_request_row)
    }

    async fn delete_friend_request(&self, id: FriendRequestId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM friend_requests WHERE id = ?1")
            .bind(friend_request_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn accept_friend_request(
        &self,
        id: FriendRequestId,
    ) -> Result<(FriendshipId, FriendshipId), StorageError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query(&format!("{REQUEST_COLUMNS} WHERE id = ?1"))
            .bind(friend_request_id_to_i64(id)?)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or(StorageError::NotFound)?;
        let request = map_friend_request_row(&row)?;

        sqlx::query("DELETE FROM friend_requests WHERE id = ?1")
            .bind(friend_request_id_to_i64(id)?)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let mut ids = Vec::with_capacity(2);
        for (user_id, friend_id) in [
            (request.requester_id, request.recipient_id),
            (request.recipient_id, request.requester_id),
        ] {
            // A no-op update lets RETURNING yield the id of an existing direction.
            let row = sqlx::query(
                r"
                INSERT INTO friendships (user_id, friend_id)
                VALUES (?1, ?2)
                ON CONFLICT(user_id, friend_id) DO UPDATE SET friend_id = excluded.friend_id
                RETURNING id
                ",
            )
            .bind(user_id_to_i64(user_id)?)
            .bind(user_id_to_i64(friend_id)?)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
            ids.push(friendship_id_from_i64(row.try_get("id").map_err(ser)?)?);
        }

        tx.commit().await.map_err(db_err)?;
        Ok((ids[0], ids[1]))
    }

    async fn friendships_for_user(&self, user_id: UserId) -> Result<Vec<Friendship>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, user_id, friend_id FROM friendships WHERE user_id = ?1 ORDER BY id ASC",
        )
        .bind(user_id_to_i64(user_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        map_rows(&rows, map_friendship_row)
    }

    async fn find_friendship(
        &self,
        user_id: UserId,
        friend_id: UserId,
    ) -> Result<Option<Friendship>, StorageError> {
        let row = sqlx::query(
            "SELECT id, user_id, friend_id FROM friendships WHERE user_id = ?1 AND friend_id = ?2",
        )
        .bind(user_id_to_i64(user_id)?)
        .bind(user_id_to_i64(friend_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_friendship_row).transpose()
    }

    async fn delete_friendship_pair(
        &self,
        user_id: UserId,
        friend_id: UserId,
    ) -> Result<u64, StorageError> {
        let res = sqlx::query(
            r"
            DELETE FROM friendships
            WHERE (user_id = ?1 AND friend_id = ?2)
               OR (user_id = ?2 AND friend_id = ?1)
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .bind(user_id_to_i64(friend_id)?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(res.rows_affected())
    }
}
