use challenge_core::model::{
    Challenge, ChallengeId, Exercise, ExerciseId, Participant, ParticipantId, ParticipantStatus,
    UserId,
};

use super::SqliteRepository;
use super::mapping::{
    challenge_id_from_i64, challenge_id_to_i64, db_err, exercise_id_from_i64, exercise_id_to_i64,
    map_challenge_row, map_exercise_row, map_participant_row, map_rows, participant_id_from_i64,
    participant_id_to_i64, user_id_to_i64,
};
use crate::repository::{
    ChallengeRepository, ClearedChallengeData, CreatedChallenge, NewChallengeRecord,
    ParticipantRepository, StorageError,
};

#[async_trait::async_trait]
impl ChallengeRepository for SqliteRepository {
    async fn insert_challenge(
        &self,
        record: NewChallengeRecord,
    ) -> Result<CreatedChallenge, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let res = sqlx::query(
            r"
            INSERT INTO challenges (name, creator_id, date, status)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(record.name)
        .bind(user_id_to_i64(record.creator_id)?)
        .bind(record.date.to_string())
        .bind(record.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        let challenge_raw = res.last_insert_rowid();
        let challenge_id = challenge_id_from_i64(challenge_raw)?;

        let mut exercise_ids = Vec::with_capacity(record.exercises.len());
        for (position, exercise) in record.exercises.into_iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("position overflow".into()))?;
            let res = sqlx::query(
                r"
                INSERT INTO exercises (challenge_id, name, target_reps, position)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(challenge_raw)
            .bind(exercise.name)
            .bind(i64::from(exercise.target_reps))
            .bind(position)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            exercise_ids.push(exercise_id_from_i64(res.last_insert_rowid())?);
        }

        let mut participant_ids = Vec::with_capacity(record.participants.len());
        for (user_id, status) in record.participants {
            let res = sqlx::query(
                r"
                INSERT INTO participants (challenge_id, user_id, status)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(challenge_raw)
            .bind(user_id_to_i64(user_id)?)
            .bind(status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            participant_ids.push(participant_id_from_i64(res.last_insert_rowid())?);
        }

        tx.commit().await.map_err(db_err)?;

        Ok(CreatedChallenge {
            challenge_id,
            exercise_ids,
            participant_ids,
        })
    }

    async fn get_challenge(&self, id: ChallengeId) -> Result<Option<Challenge>, StorageError> {
        let row =
            sqlx::query("SELECT id, name, creator_id, date, status FROM challenges WHERE id = ?1")
                .bind(challenge_id_to_i64(id)?)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.as_ref().map(map_challenge_row).transpose()
    }

    async fn exercises_for_challenge(
        &self,
        id: ChallengeId,
    ) -> Result<Vec<Exercise>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, challenge_id, name, target_reps, position
            FROM exercises
            WHERE challenge_id = ?1
            ORDER BY position ASC, id ASC
            ",
        )
        .bind(challenge_id_to_i64(id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        map_rows(&rows, map_exercise_row)
    }

    async fn get_exercise(&self, id: ExerciseId) -> Result<Option<Exercise>, StorageError> {
        let row = sqlx::query(
            "SELECT id, challenge_id, name, target_reps, position FROM exercises WHERE id = ?1",
        )
        .bind(exercise_id_to_i64(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_exercise_row).transpose()
    }

    async fn delete_challenge(&self, id: ChallengeId) -> Result<(), StorageError> {
        let raw = challenge_id_to_i64(id)?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Children first.
        for statement in [
            "DELETE FROM progress WHERE challenge_id = ?1",
            "DELETE FROM exercises WHERE challenge_id = ?1",
            "DELETE FROM participants WHERE challenge_id = ?1",
        ] {
            sqlx::query(statement)
                .bind(raw)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        let res = sqlx::query("DELETE FROM challenges WHERE id = ?1")
            .bind(raw)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn clear_all_challenges(&self) -> Result<ClearedChallengeData, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut counts = [0_u64; 4];
        for (slot, statement) in [
            "DELETE FROM progress",
            "DELETE FROM exercises",
            "DELETE FROM participants",
            "DELETE FROM challenges",
        ]
        .into_iter()
        .enumerate()
        {
            counts[slot] = sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?
                .rows_affected();
        }
        tx.commit().await.map_err(db_err)?;

        Ok(ClearedChallengeData {
            progress: counts[0],
            exercises: counts[1],
            participants: counts[2],
            challenges: counts[3],
        })
    }
}

const PARTICIPANT_COLUMNS: &str = "SELECT id, challenge_id, user_id, status FROM participants";

#[async_trait::async_trait]
impl ParticipantRepository for SqliteRepository {
    async fn get_participant(
        &self,
        id: ParticipantId,
    ) -> Result<Option<Participant>, StorageError> {
        let row = sqlx::query(&format!("{PARTICIPANT_COLUMNS} WHERE id = ?1"))
            .bind(participant_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_participant_row).transpose()
    }

    async fn find_participant(
        &self,
        challenge_id: ChallengeId,
        user_id: UserId,
    ) -> Result<Option<Participant>, StorageError> {
        let row = sqlx::query(&format!(
            "{PARTICIPANT_COLUMNS} WHERE challenge_id = ?1 AND user_id = ?2"
        ))
        .bind(challenge_id_to_i64(challenge_id)?)
        .bind(user_id_to_i64(user_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_participant_row).transpose()
    }

    async fn participants_for_challenge(
        &self,
        challenge_id: ChallengeId,
    ) -> Result<Vec<Participant>, StorageError> {
        let rows = sqlx::query(&format!(
            "{PARTICIPANT_COLUMNS} WHERE challenge_id = ?1 ORDER BY id ASC"
        ))
        .bind(challenge_id_to_i64(challenge_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        map_rows(&rows, map_participant_row)
    }

    async fn participations_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Participant>, StorageError> {
        let rows = sqlx::query(&format!(
            "{PARTICIPANT_COLUMNS} WHERE user_id = ?1 ORDER BY id ASC"
        ))
        .bind(user_id_to_i64(user_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        map_rows(&rows, map_participant_row)
    }

    async fn update_participant_status(
        &self,
        id: ParticipantId,
        status: ParticipantStatus,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE participants SET status = ?1 WHERE id = ?2")
            .bind(status.as_str())
            .bind(participant_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_participant(&self, id: ParticipantId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM participants WHERE id = ?1")
            .bind(participant_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
