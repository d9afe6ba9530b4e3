use std::sync::Arc;

use challenge_core::Clock;
use challenge_core::aggregate::{self, WeeklyProgress};
use challenge_core::streak::StreakSummary;
use storage::repository::UserRepository;

use crate::auth::current_user;
use crate::error::StatsServiceError;
use crate::snapshot::SnapshotLoader;

/// Streak and weekly dashboard numbers.
#[derive(Clone)]
pub struct StatsService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    snapshots: SnapshotLoader,
}

impl StatsService {
    #[must_use]
    pub fn new(clock: Clock, users: Arc<dyn UserRepository>, snapshots: SnapshotLoader) -> Self {
        Self {
            clock,
            users,
            snapshots,
        }
    }

    /// # Errors
    ///
    /// Returns `Time` for an unknown timezone, `Auth` or `Storage`.
    pub async fn user_streak(
        &self,
        token: Option<&str>,
        timezone: Option<&str>,
    ) -> Result<StreakSummary, StatsServiceError> {
        let me = current_user(self.users.as_ref(), token).await?;
        let today = self.clock.today_in(timezone)?;
        let snapshots = self.snapshots.load_for_user(me.id()).await?;
        Ok(aggregate::user_streak(&snapshots, me.id(), today))
    }

    /// The seven days ending today in `timezone`.
    ///
    /// # Errors
    ///
    /// Returns `Time` for an unknown timezone, `Auth` or `Storage`.
    pub async fn weekly_progress(
        &self,
        token: Option<&str>,
        timezone: Option<&str>,
    ) -> Result<WeeklyProgress, StatsServiceError> {
        let me = current_user(self.users.as_ref(), token).await?;
        let today = self.clock.today_in(timezone)?;
        let snapshots = self.snapshots.load_for_user(me.id()).await?;
        Ok(aggregate::weekly_progress(&snapshots, me.id(), today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use challenge_core::model::{ChallengeDraft, ExerciseDraft, Identity, UserId};
    use challenge_core::time::{day, fixed_clock};
    use storage::repository::{
        ChallengeRepository, InMemoryRepository, NewChallengeRecord, NewUserRecord,
        ProgressRepository, Storage,
    };

    async fn finish_challenge_on(repo: &InMemoryRepository, user: UserId, date: &str) {
        let draft = ChallengeDraft::new(
            "Daily",
            day(date),
            vec![ExerciseDraft::new("Burpees", 10)],
        )
        .unwrap();
        let created = repo
            .insert_challenge(NewChallengeRecord::from_draft(&draft, user, &[]))
            .await
            .unwrap();
        repo.upsert_progress(created.exercise_ids[0], user, created.challenge_id, 10)
            .await
            .unwrap();
    }

    async fn setup() -> (InMemoryRepository, StatsService, UserId) {
        let repo = InMemoryRepository::new();
        let storage = Storage::from_repository(repo.clone());
        let me = repo
            .insert_user(NewUserRecord::from_identity(&Identity::new("tok")))
            .await
            .unwrap();
        let snapshots =
            SnapshotLoader::new(storage.challenges, storage.participants, storage.progress);
        (repo, StatsService::new(fixed_clock(), storage.users, snapshots), me)
    }

    // fixed_clock() reads 2023-11-14 in UTC and 2023-11-15 in Tokyo.

    #[tokio::test]
    async fn streak_counts_back_from_yesterday() {
        let (repo, service, me) = setup().await;
        for date in ["2023-11-11", "2023-11-12", "2023-11-13"] {
            finish_challenge_on(&repo, me, date).await;
        }
        let streak = service.user_streak(Some("tok"), None).await.unwrap();
        assert_eq!(streak.current_streak, 3);
        assert_eq!(streak.longest_streak, 3);
        assert_eq!(streak.last_completed_date, Some(day("2023-11-13")));

        // In Tokyo today is the 15th, so the missing 14th breaks the walk.
        let tokyo = service
            .user_streak(Some("tok"), Some("Asia/Tokyo"))
            .await
            .unwrap();
        assert_eq!(tokyo.current_streak, 0);
        assert_eq!(tokyo.longest_streak, 3);
    }

    #[tokio::test]
    async fn weekly_progress_covers_seven_days() {
        let (repo, service, me) = setup().await;
        finish_challenge_on(&repo, me, "2023-11-14").await;
        let week = service.weekly_progress(Some("tok"), Some("UTC")).await.unwrap();
        assert_eq!(week.days_with_challenges.len(), 7);
        assert_eq!(week.days_with_challenges[0].date, day("2023-11-08"));
        let last = &week.days_with_challenges[6];
        assert_eq!(last.date, day("2023-11-14"));
        assert_eq!(last.challenge_count, 1);
        assert!(last.is_completed);
        assert_eq!(week.completed_challenges_this_week, 1);
    }

    #[tokio::test]
    async fn unknown_timezone_is_rejected() {
        let (_repo, service, _me) = setup().await;
        assert!(matches!(
            service.user_streak(Some("tok"), Some("Nowhere/Land")).await,
            Err(StatsServiceError::Time(_))
        ));
    }
}
