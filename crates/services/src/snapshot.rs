use std::sync::Arc;

use challenge_core::aggregate::ChallengeSnapshot;
use challenge_core::model::{ChallengeId, UserId};
use storage::repository::{
    ChallengeRepository, ParticipantRepository, ProgressRepository, StorageError,
};

/// Loads the rows the aggregation engine works on.
#[derive(Clone)]
pub struct SnapshotLoader {
    challenges: Arc<dyn ChallengeRepository>,
    participants: Arc<dyn ParticipantRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl SnapshotLoader {
    #[must_use]
    pub fn new(
        challenges: Arc<dyn ChallengeRepository>,
        participants: Arc<dyn ParticipantRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            challenges,
            participants,
            progress,
        }
    }

    /// One challenge with its exercises, participants and progress.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any repository read fails.
    pub async fn load(
        &self,
        challenge_id: ChallengeId,
    ) -> Result<Option<ChallengeSnapshot>, StorageError> {
        let Some(challenge) = self.challenges.get_challenge(challenge_id).await? else {
            return Ok(None);
        };
        let exercises = self.challenges.exercises_for_challenge(challenge_id).await?;
        let participants = self
            .participants
            .participants_for_challenge(challenge_id)
            .await?;
        let progress = self.progress.progress_for_challenge(challenge_id).await?;
        Ok(Some(ChallengeSnapshot {
            challenge,
            exercises,
            participants,
            progress,
        }))
    }

    /// Every challenge the user has a participant row for, in row order.
    ///
    /// Rows whose challenge has disappeared are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any repository read fails.
    pub async fn load_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ChallengeSnapshot>, StorageError> {
        let rows = self.participants.participations_for_user(user_id).await?;
        let mut snapshots = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(snapshot) = self.load(row.challenge_id()).await? {
                snapshots.push(snapshot);
            }
        }
        tracing::debug!(user = %user_id, challenges = snapshots.len(), "loaded snapshots");
        Ok(snapshots)
    }
}
