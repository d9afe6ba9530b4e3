use challenge_core::model::{ChallengeId, ExerciseId, ProgressId, ProgressRecord, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    challenge_id_to_i64, db_err, exercise_id_to_i64, map_progress_row, map_rows,
    progress_id_from_i64, ser, user_id_to_i64,
};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn upsert_progress(
        &self,
        exercise_id: ExerciseId,
        user_id: UserId,
        challenge_id: ChallengeId,
        completed_reps: u32,
    ) -> Result<ProgressId, StorageError> {
        let row = sqlx::query(
            r"
            INSERT INTO progress (exercise_id, user_id, challenge_id, completed_reps)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(exercise_id, user_id) DO UPDATE SET
                completed_reps = excluded.completed_reps
            RETURNING id
            ",
        )
        .bind(exercise_id_to_i64(exercise_id)?)
        .bind(user_id_to_i64(user_id)?)
        .bind(challenge_id_to_i64(challenge_id)?)
        .bind(i64::from(completed_reps))
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        progress_id_from_i64(row.try_get("id").map_err(ser)?)
    }

    async fn get_progress(
        &self,
        exercise_id: ExerciseId,
        user_id: UserId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, exercise_id, user_id, challenge_id, completed_reps
            FROM progress
            WHERE exercise_id = ?1 AND user_id = ?2
            ",
        )
        .bind(exercise_id_to_i64(exercise_id)?)
        .bind(user_id_to_i64(user_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_progress_row).transpose()
    }

    async fn progress_for_challenge(
        &self,
        challenge_id: ChallengeId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, exercise_id, user_id, challenge_id, completed_reps
            FROM progress
            WHERE challenge_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(challenge_id_to_i64(challenge_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        map_rows(&rows, map_progress_row)
    }

    async fn progress_for_user(
        &self,
        challenge_id: ChallengeId,
        user_id: UserId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, exercise_id, user_id, challenge_id, completed_reps
            FROM progress
            WHERE challenge_id = ?1 AND user_id = ?2
            ORDER BY id ASC
            ",
        )
        .bind(challenge_id_to_i64(challenge_id)?)
        .bind(user_id_to_i64(user_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        map_rows(&rows, map_progress_row)
    }

    async fn delete_progress_for_user(
        &self,
        challenge_id: ChallengeId,
        user_id: UserId,
    ) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM progress WHERE challenge_id = ?1 AND user_id = ?2")
            .bind(challenge_id_to_i64(challenge_id)?)
            .bind(user_id_to_i64(user_id)?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected())
    }
}
