use std::sync::Arc;

use challenge_core::model::{ExerciseId, ProgressId, validate_completed_reps};
use storage::repository::{
    ChallengeRepository, ParticipantRepository, ProgressRepository, UserRepository,
};

use crate::auth::current_user;
use crate::error::ProgressServiceError;

/// Writes a participant's completed reps for one exercise.
#[derive(Clone)]
pub struct ProgressService {
    users: Arc<dyn UserRepository>,
    challenges: Arc<dyn ChallengeRepository>,
    participants: Arc<dyn ParticipantRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        challenges: Arc<dyn ChallengeRepository>,
        participants: Arc<dyn ParticipantRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            users,
            challenges,
            participants,
            progress,
        }
    }

    /// Record the caller's rep count for an exercise. Last write wins.
    ///
    /// Counts above the target are stored as given; aggregation clamps them.
    ///
    /// # Errors
    ///
    /// Returns `Progress(NegativeReps)` for negative input, `ExerciseNotFound`,
    /// `NotParticipant` when the caller has no row in the challenge, `Auth` or
    /// `Storage`.
    pub async fn update_exercise_progress(
        &self,
        token: Option<&str>,
        exercise_id: ExerciseId,
        completed_reps: i64,
    ) -> Result<ProgressId, ProgressServiceError> {
        let me = current_user(self.users.as_ref(), token).await?;
        let completed_reps = validate_completed_reps(completed_reps)?;
        let exercise = self
            .challenges
            .get_exercise(exercise_id)
            .await?
            .ok_or(ProgressServiceError::ExerciseNotFound)?;
        self.participants
            .find_participant(exercise.challenge_id(), me.id())
            .await?
            .ok_or(ProgressServiceError::NotParticipant)?;

        let id = self
            .progress
            .upsert_progress(exercise_id, me.id(), exercise.challenge_id(), completed_reps)
            .await?;
        tracing::debug!(exercise = %exercise_id, user = %me.id(), completed_reps, "progress saved");
        Ok(id)
    }
}
