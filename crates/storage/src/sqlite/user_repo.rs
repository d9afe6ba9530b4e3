use challenge_core::model::{User, UserId};

use super::SqliteRepository;
use super::mapping::{db_err, map_rows, map_user_row, user_id_from_i64, user_id_to_i64};
use crate::repository::{NewUserRecord, StorageError, UserRepository};

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO users (name, token_identifier, email)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(user.name)
        .bind(user.token_identifier)
        .bind(user.email)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        user_id_from_i64(res.last_insert_rowid())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query("SELECT id, name, token_identifier, email FROM users WHERE id = ?1")
            .bind(user_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn find_user_by_token(&self, token: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(
            "SELECT id, name, token_identifier, email FROM users WHERE token_identifier = ?1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn update_user_profile(
        &self,
        id: UserId,
        name: &str,
        email: Option<&str>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE users SET name = ?1, email = ?2 WHERE id = ?3")
            .bind(name)
            .bind(email)
            .bind(user_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        let rows = sqlx::query("SELECT id, name, token_identifier, email FROM users ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        map_rows(&rows, map_user_row)
    }
}
