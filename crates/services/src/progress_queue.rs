//! Debounced progress writes.
//!
//! A rep counter in the UI fires on every tap. The queue keeps the latest
//! value per exercise and writes them once the caller has been idle for
//! `delay`, or immediately on [`ProgressWriteQueue::flush`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use challenge_core::model::ExerciseId;
use tokio::sync::Mutex;

use crate::error::ProgressServiceError;
use crate::progress_service::ProgressService;

/// Pending writes for one caller, keyed by exercise.
#[derive(Clone)]
pub struct ProgressWriteQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    service: ProgressService,
    token: Option<String>,
    delay: Duration,
    pending: Mutex<HashMap<ExerciseId, i64>>,
    generation: AtomicU64,
    // Held for a whole flush so batches land in the order they were drained.
    flushing: Mutex<()>,
}

impl ProgressWriteQueue {
    #[must_use]
    pub fn new(service: ProgressService, token: Option<String>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                service,
                token,
                delay,
                pending: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                flushing: Mutex::new(()),
            }),
        }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Buffer a value and restart the idle timer. Must run inside a tokio
    /// runtime.
    pub async fn record(&self, exercise_id: ExerciseId, completed_reps: i64) {
        self.inner
            .pending
            .lock()
            .await
            .insert(exercise_id, completed_reps);
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;
            if inner.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            if let Err(err) = inner.flush().await {
                tracing::warn!(error = %err, "debounced progress flush failed");
            }
        });
    }

    /// Number of exercises waiting to be written.
    pub async fn pending_len(&self) -> usize {
        self.inner.pending.lock().await.len()
    }

    /// Write everything now. Returns how many records were written. Waits for
    /// any flush already in progress.
    ///
    /// # Errors
    ///
    /// Returns the first `ProgressServiceError`; the failed write and any not
    /// yet attempted stay queued unless a newer value arrived meanwhile.
    pub async fn flush(&self) -> Result<usize, ProgressServiceError> {
        self.inner.flush().await
    }
}

impl QueueInner {
    async fn flush(&self) -> Result<usize, ProgressServiceError> {
        let _flushing = self.flushing.lock().await;
        let mut batch: Vec<(ExerciseId, i64)> =
            std::mem::take(&mut *self.pending.lock().await).into_iter().collect();
        batch.sort_by_key(|(exercise_id, _)| *exercise_id);

        let mut written = 0;
        let mut remaining = batch.into_iter();
        while let Some((exercise_id, reps)) = remaining.next() {
            if let Err(err) = self
                .service
                .update_exercise_progress(self.token.as_deref(), exercise_id, reps)
                .await
            {
                let mut pending = self.pending.lock().await;
                for (id, value) in std::iter::once((exercise_id, reps)).chain(remaining) {
                    pending.entry(id).or_insert(value);
                }
                return Err(err);
            }
            written += 1;
        }
        if written > 0 {
            tracing::debug!(written, "flushed progress writes");
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use challenge_core::model::{ChallengeDraft, ExerciseDraft, Identity, UserId};
    use challenge_core::time::day;
    use storage::repository::{
        ChallengeRepository, InMemoryRepository, NewChallengeRecord, NewUserRecord,
        ProgressRepository, Storage, UserRepository,
    };

    const DELAY: Duration = Duration::from_millis(500);

    async fn setup(token: &str) -> (InMemoryRepository, ProgressWriteQueue, UserId, Vec<ExerciseId>) {
        let repo = InMemoryRepository::new();
        let storage = Storage::from_repository(repo.clone());
        let me = repo
            .insert_user(NewUserRecord::from_identity(&Identity::new("tok")))
            .await
            .unwrap();
        let draft = ChallengeDraft::new(
            "Arms",
            day("2024-03-01"),
            vec![ExerciseDraft::new("Curls", 15), ExerciseDraft::new("Dips", 12)],
        )
        .unwrap();
        let created = repo
            .insert_challenge(NewChallengeRecord::from_draft(&draft, me, &[]))
            .await
            .unwrap();
        let service = ProgressService::new(
            storage.users,
            storage.challenges,
            storage.participants,
            storage.progress,
        );
        let queue = ProgressWriteQueue::new(service, Some(token.to_owned()), DELAY);
        (repo, queue, me, created.exercise_ids)
    }

    #[tokio::test(start_paused = true)]
    async fn writes_latest_value_after_idle_delay() {
        let (repo, queue, me, exercises) = setup("tok").await;
        for reps in [1, 2, 3] {
            queue.record(exercises[0], reps).await;
        }
        queue.record(exercises[1], 4).await;
        assert_eq!(queue.pending_len().await, 2);

        tokio::time::sleep(DELAY / 2).await;
        assert!(repo.get_progress(exercises[0], me).await.unwrap().is_none());

        // Another tap restarts the timer.
        queue.record(exercises[0], 5).await;
        tokio::time::sleep(DELAY * 3 / 4).await;
        assert!(repo.get_progress(exercises[0], me).await.unwrap().is_none());

        tokio::time::sleep(DELAY).await;
        let first = repo.get_progress(exercises[0], me).await.unwrap().unwrap();
        let second = repo.get_progress(exercises[1], me).await.unwrap().unwrap();
        assert_eq!(first.completed_reps, 5);
        assert_eq!(second.completed_reps, 4);
        assert_eq!(queue.pending_len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_flush_writes_immediately() {
        let (repo, queue, me, exercises) = setup("tok").await;
        queue.record(exercises[1], 9).await;
        assert_eq!(queue.flush().await.unwrap(), 1);
        assert_eq!(
            repo.get_progress(exercises[1], me)
                .await
                .unwrap()
                .unwrap()
                .completed_reps,
            9
        );
        assert_eq!(queue.flush().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_flush_keeps_writes_queued() {
        let (_repo, queue, _me, exercises) = setup("nobody").await;
        queue.record(exercises[0], 3).await;
        assert!(matches!(
            queue.flush().await,
            Err(ProgressServiceError::Auth(_))
        ));
        assert_eq!(queue.pending_len().await, 1);

        // A newer tap replaces the value that failed.
        queue.record(exercises[0], 8).await;
        assert_eq!(queue.pending_len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_waits_for_the_one_in_progress() {
        let (repo, queue, me, exercises) = setup("tok").await;
        let in_progress = queue.inner.flushing.lock().await;

        queue.record(exercises[0], 3).await;
        let waiting = tokio::spawn({
            let queue = queue.clone();
            async move { queue.flush().await }
        });
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert!(repo.get_progress(exercises[0], me).await.unwrap().is_none());
        assert_eq!(queue.pending_len().await, 1);

        queue.record(exercises[0], 7).await;
        drop(in_progress);
        assert_eq!(waiting.await.unwrap().unwrap(), 1);
        assert_eq!(
            repo.get_progress(exercises[0], me)
                .await
                .unwrap()
                .unwrap()
                .completed_reps,
            7
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_flushes_keep_the_newest_value() {
        let (repo, queue, me, exercises) = setup("tok").await;
        queue.record(exercises[0], 3).await;
        let (first, second) = tokio::join!(queue.flush(), async {
            queue.record(exercises[0], 7).await;
            queue.flush().await
        });
        assert_eq!(first.unwrap() + second.unwrap(), 2);
        assert_eq!(
            repo.get_progress(exercises[0], me)
                .await
                .unwrap()
                .unwrap()
                .completed_reps,
            7
        );
    }
}
