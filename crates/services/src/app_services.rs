use std::sync::Arc;
use std::time::Duration;

use storage::repository::Storage;

use crate::Clock;
use crate::challenge_service::ChallengeService;
use crate::error::AppServicesError;
use crate::friendship_service::FriendshipService;
use crate::notification_service::NotificationService;
use crate::notifier::Notifier;
use crate::progress_queue::ProgressWriteQueue;
use crate::progress_service::ProgressService;
use crate::snapshot::SnapshotLoader;
use crate::stats_service::StatsService;
use crate::user_service::UserService;

/// Assembles every handler over one storage backend and clock.
#[derive(Clone)]
pub struct AppServices {
    users: Arc<UserService>,
    challenges: Arc<ChallengeService>,
    progress: Arc<ProgressService>,
    stats: Arc<StatsService>,
    friendships: Arc<FriendshipService>,
    notifications: Arc<NotificationService>,
}

impl AppServices {
    #[must_use]
    pub fn new(storage: &Storage, clock: Clock) -> Self {
        let notifier = Notifier::new(clock, Arc::clone(&storage.notifications));
        let snapshots = SnapshotLoader::new(
            Arc::clone(&storage.challenges),
            Arc::clone(&storage.participants),
            Arc::clone(&storage.progress),
        );

        let challenges = ChallengeService::new(
            clock,
            Arc::clone(&storage.users),
            Arc::clone(&storage.challenges),
            Arc::clone(&storage.participants),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.friendships),
            notifier.clone(),
        );
        let friendships = FriendshipService::new(
            clock,
            Arc::clone(&storage.users),
            Arc::clone(&storage.friendships),
            notifier.clone(),
        );
        let notifications = NotificationService::new(
            Arc::clone(&storage.users),
            Arc::clone(&storage.notifications),
            Arc::clone(&storage.participants),
            Arc::clone(&storage.friendships),
            notifier,
            challenges.clone(),
            friendships.clone(),
        );

        Self {
            users: Arc::new(UserService::new(Arc::clone(&storage.users))),
            progress: Arc::new(ProgressService::new(
                Arc::clone(&storage.users),
                Arc::clone(&storage.challenges),
                Arc::clone(&storage.participants),
                Arc::clone(&storage.progress),
            )),
            stats: Arc::new(StatsService::new(
                clock,
                Arc::clone(&storage.users),
                snapshots,
            )),
            challenges: Arc::new(challenges),
            friendships: Arc::new(friendships),
            notifications: Arc::new(notifications),
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(&storage, clock))
    }

    #[must_use]
    pub fn users(&self) -> Arc<UserService> {
        Arc::clone(&self.users)
    }

    #[must_use]
    pub fn challenges(&self) -> Arc<ChallengeService> {
        Arc::clone(&self.challenges)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn stats(&self) -> Arc<StatsService> {
        Arc::clone(&self.stats)
    }

    #[must_use]
    pub fn friendships(&self) -> Arc<FriendshipService> {
        Arc::clone(&self.friendships)
    }

    #[must_use]
    pub fn notifications(&self) -> Arc<NotificationService> {
        Arc::clone(&self.notifications)
    }

    /// A debounced write queue acting as `token`.
    #[must_use]
    pub fn progress_queue(&self, token: Option<&str>, delay: Duration) -> ProgressWriteQueue {
        ProgressWriteQueue::new(
            (*self.progress).clone(),
            token.map(str::to_owned),
            delay,
        )
    }
}
