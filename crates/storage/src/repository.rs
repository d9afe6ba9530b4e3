use async_trait::async_trait;
use challenge_core::CalendarDay;
use challenge_core::model::{
    Challenge, ChallengeDraft, ChallengeId, ChallengeStatus, Exercise, ExerciseDraft, ExerciseId,
    FriendRequest, FriendRequestId, Friendship, FriendshipId, Identity, Notification,
    NotificationId, NotificationKind, Participant, ParticipantId, ParticipantStatus,
    ProgressId, ProgressRecord, User, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Insert shape for a user; the repository assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserRecord {
    pub name: String,
    pub token_identifier: String,
    pub email: Option<String>,
}

impl NewUserRecord {
    #[must_use]
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            name: identity
                .name
                .clone()
                .unwrap_or_else(|| challenge_core::model::DEFAULT_USER_NAME.to_owned()),
            token_identifier: identity.token_identifier.clone(),
            email: identity.email.clone(),
        }
    }
}

/// Everything created together with a challenge, inserted atomically.
///
/// Exercise order is the position in `exercises`. Participant ids in the
/// returned [`CreatedChallenge`] follow the order of `participants`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChallengeRecord {
    pub name: String,
    pub creator_id: UserId,
    pub date: CalendarDay,
    pub status: ChallengeStatus,
    pub exercises: Vec<ExerciseDraft>,
    pub participants: Vec<(UserId, ParticipantStatus)>,
}

impl NewChallengeRecord {
    /// Creator joins as `Active`, every invitee starts `Invited`.
    #[must_use]
    pub fn from_draft(draft: &ChallengeDraft, creator_id: UserId, invitees: &[UserId]) -> Self {
        let mut participants = Vec::with_capacity(invitees.len() + 1);
        participants.push((creator_id, ParticipantStatus::Active));
        participants.extend(
            invitees
                .iter()
                .map(|user_id| (*user_id, ParticipantStatus::Invited)),
        );
        Self {
            name: draft.name().to_owned(),
            creator_id,
            date: draft.date(),
            status: ChallengeStatus::Active,
            exercises: draft.exercises().to_vec(),
            participants,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedChallenge {
    pub challenge_id: ChallengeId,
    pub exercise_ids: Vec<ExerciseId>,
    pub participant_ids: Vec<ParticipantId>,
}

/// Row counts removed by [`ChallengeRepository::clear_all_challenges`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearedChallengeData {
    pub challenges: u64,
    pub exercises: u64,
    pub participants: u64,
    pub progress: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotificationRecord {
    pub user_id: UserId,
    pub message: String,
    pub kind: NotificationKind,
    pub related_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the token identifier is taken.
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    async fn find_user_by_token(&self, token: &str) -> Result<Option<User>, StorageError>;

    /// Replace name and email.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist.
    async fn update_user_profile(
        &self,
        id: UserId,
        name: &str,
        email: Option<&str>,
    ) -> Result<(), StorageError>;

    /// All users ordered by id.
    async fn list_users(&self) -> Result<Vec<User>, StorageError>;
}

#[async_trait]
pub trait ChallengeRepository: Send + Sync {
    /// Insert a challenge with its exercises and participant rows in one unit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when a user is listed twice, or other
    /// storage errors; nothing is written on failure.
    async fn insert_challenge(
        &self,
        record: NewChallengeRecord,
    ) -> Result<CreatedChallenge, StorageError>;

    async fn get_challenge(&self, id: ChallengeId) -> Result<Option<Challenge>, StorageError>;

    /// Exercises of a challenge ordered by position.
    async fn exercises_for_challenge(
        &self,
        id: ChallengeId,
    ) -> Result<Vec<Exercise>, StorageError>;

    async fn get_exercise(&self, id: ExerciseId) -> Result<Option<Exercise>, StorageError>;

    /// Delete a challenge with its progress, exercises and participants.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the challenge does not exist.
    async fn delete_challenge(&self, id: ChallengeId) -> Result<(), StorageError>;

    /// Remove every challenge and dependent row.
    async fn clear_all_challenges(&self) -> Result<ClearedChallengeData, StorageError>;
}

#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    async fn get_participant(
        &self,
        id: ParticipantId,
    ) -> Result<Option<Participant>, StorageError>;

    async fn find_participant(
        &self,
        challenge_id: ChallengeId,
        user_id: UserId,
    ) -> Result<Option<Participant>, StorageError>;

    /// Rows of a challenge in creation order.
    async fn participants_for_challenge(
        &self,
        challenge_id: ChallengeId,
    ) -> Result<Vec<Participant>, StorageError>;

    /// Rows of a user in creation order.
    async fn participations_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Participant>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row does not exist.
    async fn update_participant_status(
        &self,
        id: ParticipantId,
        status: ParticipantStatus,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row does not exist.
    async fn delete_participant(&self, id: ParticipantId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Insert or overwrite the record for (exercise, user). Last write wins.
    async fn upsert_progress(
        &self,
        exercise_id: ExerciseId,
        user_id: UserId,
        challenge_id: ChallengeId,
        completed_reps: u32,
    ) -> Result<ProgressId, StorageError>;

    async fn get_progress(
        &self,
        exercise_id: ExerciseId,
        user_id: UserId,
    ) -> Result<Option<ProgressRecord>, StorageError>;

    async fn progress_for_challenge(
        &self,
        challenge_id: ChallengeId,
    ) -> Result<Vec<ProgressRecord>, StorageError>;

    async fn progress_for_user(
        &self,
        challenge_id: ChallengeId,
        user_id: UserId,
    ) -> Result<Vec<ProgressRecord>, StorageError>;

    /// Returns the number of deleted records.
    async fn delete_progress_for_user(
        &self,
        challenge_id: ChallengeId,
        user_id: UserId,
    ) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait FriendshipRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the same request already exists.
    async fn insert_friend_request(
        &self,
        requester_id: UserId,
        recipient_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<FriendRequestId, StorageError>;

    async fn get_friend_request(
        &self,
        id: FriendRequestId,
    ) -> Result<Option<FriendRequest>, StorageError>;

    async fn find_friend_request(
        &self,
        requester_id: UserId,
        recipient_id: UserId,
    ) -> Result<Option<FriendRequest>, StorageError>;

    async fn requests_from(&self, requester_id: UserId)
    -> Result<Vec<FriendRequest>, StorageError>;

    async fn requests_to(&self, recipient_id: UserId) -> Result<Vec<FriendRequest>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the request does not exist.
    async fn delete_friend_request(&self, id: FriendRequestId) -> Result<(), StorageError>;

    /// Delete the request and store both friendship directions in one unit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the request does not exist.
    async fn accept_friend_request(
        &self,
        id: FriendRequestId,
    ) -> Result<(FriendshipId, FriendshipId), StorageError>;

    async fn friendships_for_user(&self, user_id: UserId) -> Result<Vec<Friendship>, StorageError>;

    async fn find_friendship(
        &self,
        user_id: UserId,
        friend_id: UserId,
    ) -> Result<Option<Friendship>, StorageError>;

    /// Delete both directions; returns how many rows existed.
    async fn delete_friendship_pair(
        &self,
        user_id: UserId,
        friend_id: UserId,
    ) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notification(
        &self,
        notification: NewNotificationRecord,
    ) -> Result<NotificationId, StorageError>;

    async fn get_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, StorageError>;

    /// Newest first.
    async fn notifications_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Notification>, StorageError>;

    async fn unread_count(&self, user_id: UserId) -> Result<u64, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the notification does not exist.
    async fn mark_read(&self, id: NotificationId) -> Result<(), StorageError>;

    async fn mark_all_read(&self, user_id: UserId) -> Result<u64, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the notification does not exist.
    async fn delete_notification(&self, id: NotificationId) -> Result<(), StorageError>;

    async fn delete_all_for_user(&self, user_id: UserId) -> Result<u64, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    users: BTreeMap<UserId, User>,
    challenges: BTreeMap<ChallengeId, Challenge>,
    exercises: BTreeMap<ExerciseId, Exercise>,
    participants: BTreeMap<ParticipantId, Participant>,
    progress: BTreeMap<ProgressId, ProgressRecord>,
    friend_requests: BTreeMap<FriendRequestId, FriendRequest>,
    friendships: BTreeMap<FriendshipId, Friendship>,
    notifications: BTreeMap<NotificationId, Notification>,
}

impl MemoryState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Ordered maps keep iteration in id (creation) order, matching the `SQLite`
/// backend's `ORDER BY id`.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError> {
        let mut guard = self.lock()?;
        if guard
            .users
            .values()
            .any(|u| u.token_identifier() == user.token_identifier)
        {
            return Err(StorageError::Conflict);
        }
        let id = UserId::new(guard.next_id());
        let user = User::new(id, user.name, user.token_identifier, user.email).map_err(ser)?;
        guard.users.insert(id, user);
        Ok(id)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_user_by_token(&self, token: &str) -> Result<Option<User>, StorageError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.token_identifier() == token)
            .cloned())
    }

    async fn update_user_profile(
        &self,
        id: UserId,
        name: &str,
        email: Option<&str>,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let existing = guard.users.get(&id).ok_or(StorageError::NotFound)?;
        let updated = User::new(
            id,
            name,
            existing.token_identifier().to_owned(),
            email.map(str::to_owned),
        )
        .map_err(ser)?;
        guard.users.insert(id, updated);
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        Ok(self.lock()?.users.values().cloned().collect())
    }
}

#[async_trait]
impl ChallengeRepository for InMemoryRepository {
    async fn insert_challenge(
        &self,
        record: NewChallengeRecord,
    ) -> Result<CreatedChallenge, StorageError> {
        let mut guard = self.lock()?;

        let mut seen = std::collections::HashSet::new();
        if !record.participants.iter().all(|(user, _)| seen.insert(*user)) {
            return Err(StorageError::Conflict);
        }

        let challenge_id = ChallengeId::new(guard.next_id());
        let challenge = Challenge::new(
            challenge_id,
            record.name,
            record.creator_id,
            record.date,
            record.status,
        )
        .map_err(ser)?;

        // Build every row before touching the maps so a validation failure writes nothing.
        let mut exercises = Vec::with_capacity(record.exercises.len());
        for (order, draft) in record.exercises.into_iter().enumerate() {
            let order = u32::try_from(order).map_err(ser)?;
            let exercise = Exercise::new(
                ExerciseId::new(guard.next_id()),
                challenge_id,
                draft.name,
                draft.target_reps,
                order,
            )
            .map_err(ser)?;
            exercises.push(exercise);
        }
        let participants: Vec<Participant> = record
            .participants
            .into_iter()
            .map(|(user_id, status)| {
                Participant::new(
                    ParticipantId::new(guard.next_id()),
                    challenge_id,
                    user_id,
                    status,
                )
            })
            .collect();

        let created = CreatedChallenge {
            challenge_id,
            exercise_ids: exercises.iter().map(Exercise::id).collect(),
            participant_ids: participants.iter().map(Participant::id).collect(),
        };

        guard.challenges.insert(challenge_id, challenge);
        for exercise in exercises {
            guard.exercises.insert(exercise.id(), exercise);
        }
        for participant in participants {
            guard.participants.insert(participant.id(), participant);
        }
        Ok(created)
    }

    async fn get_challenge(&self, id: ChallengeId) -> Result<Option<Challenge>, StorageError> {
        Ok(self.lock()?.challenges.get(&id).cloned())
    }

    async fn exercises_for_challenge(
        &self,
        id: ChallengeId,
    ) -> Result<Vec<Exercise>, StorageError> {
        let mut exercises: Vec<Exercise> = self
            .lock()?
            .exercises
            .values()
            .filter(|e| e.challenge_id() == id)
            .cloned()
            .collect();
        exercises.sort_by_key(Exercise::order);
        Ok(exercises)
    }

    async fn get_exercise(&self, id: ExerciseId) -> Result<Option<Exercise>, StorageError> {
        Ok(self.lock()?.exercises.get(&id).cloned())
    }

    async fn delete_challenge(&self, id: ChallengeId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard.challenges.remove(&id).is_none() {
            return Err(StorageError::NotFound);
        }
        guard.progress.retain(|_, p| p.challenge_id != id);
        guard.exercises.retain(|_, e| e.challenge_id() != id);
        guard.participants.retain(|_, p| p.challenge_id() != id);
        Ok(())
    }

    async fn clear_all_challenges(&self) -> Result<ClearedChallengeData, StorageError> {
        let mut guard = self.lock()?;
        let cleared = ClearedChallengeData {
            challenges: guard.challenges.len() as u64,
            exercises: guard.exercises.len() as u64,
            participants: guard.participants.len() as u64,
            progress: guard.progress.len() as u64,
        };
        guard.progress.clear();
        guard.exercises.clear();
        guard.participants.clear();
        guard.challenges.clear();
        Ok(cleared)
    }
}

#[async_trait]
impl ParticipantRepository for InMemoryRepository {
    async fn get_participant(
        &self,
        id: ParticipantId,
    ) -> Result<Option<Participant>, StorageError> {
        Ok(self.lock()?.participants.get(&id).cloned())
    }

    async fn find_participant(
        &self,
        challenge_id: ChallengeId,
        user_id: UserId,
    ) -> Result<Option<Participant>, StorageError> {
        Ok(self
            .lock()?
            .participants
            .values()
            .find(|p| p.challenge_id() == challenge_id && p.user_id() == user_id)
            .cloned())
    }

    async fn participants_for_challenge(
        &self,
        challenge_id: ChallengeId,
    ) -> Result<Vec<Participant>, StorageError> {
        Ok(self
            .lock()?
            .participants
            .values()
            .filter(|p| p.challenge_id() == challenge_id)
            .cloned()
            .collect())
    }

    async fn participations_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Participant>, StorageError> {
        Ok(self
            .lock()?
            .participants
            .values()
            .filter(|p| p.user_id() == user_id)
            .cloned()
            .collect())
    }

    async fn update_participant_status(
        &self,
        id: ParticipantId,
        status: ParticipantStatus,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let existing = guard.participants.get(&id).ok_or(StorageError::NotFound)?;
        let updated = Participant::new(id, existing.challenge_id(), existing.user_id(), status);
        guard.participants.insert(id, updated);
        Ok(())
    }

    async fn delete_participant(&self, id: ParticipantId) -> Result<(), StorageError> {
        self.lock()?
            .participants
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn upsert_progress(
        &self,
        exercise_id: ExerciseId,
        user_id: UserId,
        challenge_id: ChallengeId,
        completed_reps: u32,
    ) -> Result<ProgressId, StorageError> {
        let mut guard = self.lock()?;
        if let Some(existing) = guard
            .progress
            .values_mut()
            .find(|p| p.exercise_id == exercise_id && p.user_id == user_id)
        {
            existing.completed_reps = completed_reps;
            return Ok(existing.id);
        }
        let id = ProgressId::new(guard.next_id());
        guard.progress.insert(
            id,
            ProgressRecord {
                id,
                exercise_id,
                user_id,
                challenge_id,
                completed_reps,
            },
        );
        Ok(id)
    }

    async fn get_progress(
        &self,
        exercise_id: ExerciseId,
        user_id: UserId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        Ok(self
            .lock()?
            .progress
            .values()
            .find(|p| p.exercise_id == exercise_id && p.user_id == user_id)
            .cloned())
    }

    async fn progress_for_challenge(
        &self,
        challenge_id: ChallengeId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        Ok(self
            .lock()?
            .progress
            .values()
            .filter(|p| p.challenge_id == challenge_id)
            .cloned()
            .collect())
    }

    async fn progress_for_user(
        &self,
        challenge_id: ChallengeId,
        user_id: UserId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        Ok(self
            .lock()?
            .progress
            .values()
            .filter(|p| p.challenge_id == challenge_id && p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_progress_for_user(
        &self,
        challenge_id: ChallengeId,
        user_id: UserId,
    ) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        let before = guard.progress.len();
        guard
            .progress
            .retain(|_, p| !(p.challenge_id == challenge_id && p.user_id == user_id));
        Ok((before - guard.progress.len()) as u64)
    }
}

#[async_trait]
impl FriendshipRepository for InMemoryRepository {
    async fn insert_friend_request(
        &self,
        requester_id: UserId,
        recipient_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<FriendRequestId, StorageError> {
        let mut guard = self.lock()?;
        if guard
            .friend_requests
            .values()
            .any(|r| r.requester_id == requester_id && r.recipient_id == recipient_id)
        {
            return Err(StorageError::Conflict);
        }
        let id = FriendRequestId::new(guard.next_id());
        guard.friend_requests.insert(
            id,
            FriendRequest {
                id,
                requester_id,
                recipient_id,
                created_at,
            },
        );
        Ok(id)
    }

    async fn get_friend_request(
        &self,
        id: FriendRequestId,
    ) -> Result<Option<FriendRequest>, StorageError> {
        Ok(self.lock()?.friend_requests.get(&id).cloned())
    }

    async fn find_friend_request(
        &self,
        requester_id: UserId,
        recipient_id: UserId,
    ) -> Result<Option<FriendRequest>, StorageError> {
        Ok(self
            .lock()?
            .friend_requests
            .values()
            .find(|r| r.requester_id == requester_id && r.recipient_id == recipient_id)
            .cloned())
    }

    async fn requests_from(
        &self,
        requester_id: UserId,
    ) -> Result<Vec<FriendRequest>, StorageError> {
        Ok(self
            .lock()?
            .friend_requests
            .values()
            .filter(|r| r.requester_id == requester_id)
            .cloned()
            .collect())
    }

    async fn requests_to(&self, recipient_id: UserId) -> Result<Vec<FriendRequest>, StorageError> {
        Ok(self
            .lock()?
            .friend_requests
            .values()
            .filter(|r| r.recipient_id == recipient_id)
            .cloned()
            .collect())
    }

    async fn delete_friend_request(&self, id: FriendRequestId) -> Result<(), StorageError> {
        self.lock()?
            .friend_requests
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn accept_friend_request(
        &self,
        id: FriendRequestId,
    ) -> Result<(FriendshipId, FriendshipId), StorageError> {
        let mut guard = self.lock()?;
        let request = guard
            .friend_requests
            .remove(&id)
            .ok_or(StorageError::NotFound)?;

        let mut ids = [FriendshipId::new(0); 2];
        for (slot, (user_id, friend_id)) in [
            (request.requester_id, request.recipient_id),
            (request.recipient_id, request.requester_id),
        ]
        .into_iter()
        .enumerate()
        {
            let already = guard
                .friendships
                .values()
                .find(|f| f.user_id == user_id && f.friend_id == friend_id)
                .map(|f| f.id);
            ids[slot] = match already {
                Some(existing) => existing,
                None => {
                    let fid = FriendshipId::new(guard.next_id());
                    guard.friendships.insert(
                        fid,
                        Friendship {
                            id: fid,
                            user_id,
                            friend_id,
                        },
                    );
                    fid
                }
            };
        }
        Ok((ids[0], ids[1]))
    }

    async fn friendships_for_user(&self, user_id: UserId) -> Result<Vec<Friendship>, StorageError> {
        Ok(self
            .lock()?
            .friendships
            .values()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_friendship(
        &self,
        user_id: UserId,
        friend_id: UserId,
    ) -> Result<Option<Friendship>, StorageError> {
        Ok(self
            .lock()?
            .friendships
            .values()
            .find(|f| f.user_id == user_id && f.friend_id == friend_id)
            .cloned())
    }

    async fn delete_friendship_pair(
        &self,
        user_id: UserId,
        friend_id: UserId,
    ) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        let before = guard.friendships.len();
        guard.friendships.retain(|_, f| {
            !((f.user_id == user_id && f.friend_id == friend_id)
                || (f.user_id == friend_id && f.friend_id == user_id))
        });
        Ok((before - guard.friendships.len()) as u64)
    }
}

#[async_trait]
impl NotificationRepository for InMemoryRepository {
    async fn insert_notification(
        &self,
        notification: NewNotificationRecord,
    ) -> Result<NotificationId, StorageError> {
        let mut guard = self.lock()?;
        let id = NotificationId::new(guard.next_id());
        guard.notifications.insert(
            id,
            Notification {
                id,
                user_id: notification.user_id,
                message: notification.message,
                is_read: false,
                created_at: notification.created_at,
                kind: notification.kind,
                related_id: notification.related_id,
            },
        );
        Ok(id)
    }

    async fn get_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, StorageError> {
        Ok(self.lock()?.notifications.get(&id).cloned())
    }

    async fn notifications_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Notification>, StorageError> {
        let mut found: Vec<Notification> = self
            .lock()?
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(found)
    }

    async fn unread_count(&self, user_id: UserId) -> Result<u64, StorageError> {
        Ok(self
            .lock()?
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as u64)
    }

    async fn mark_read(&self, id: NotificationId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let notification = guard
            .notifications
            .get_mut(&id)
            .ok_or(StorageError::NotFound)?;
        notification.is_read = true;
        Ok(())
    }

    async fn mark_all_read(&self, user_id: UserId) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        let mut changed = 0;
        for n in guard
            .notifications
            .values_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            n.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete_notification(&self, id: NotificationId) -> Result<(), StorageError> {
        self.lock()?
            .notifications
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn delete_all_for_user(&self, user_id: UserId) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        let before = guard.notifications.len();
        guard.notifications.retain(|_, n| n.user_id != user_id);
        Ok((before - guard.notifications.len()) as u64)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub challenges: Arc<dyn ChallengeRepository>,
    pub participants: Arc<dyn ParticipantRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub friendships: Arc<dyn FriendshipRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Share one backend across every repository slot.
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: UserRepository
            + ChallengeRepository
            + ParticipantRepository
            + ProgressRepository
            + FriendshipRepository
            + NotificationRepository
            + Clone
            + 'static,
    {
        Self {
            users: Arc::new(repo.clone()),
            challenges: Arc::new(repo.clone()),
            participants: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            friendships: Arc::new(repo.clone()),
            notifications: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use challenge_core::time::{day, fixed_now};

    async fn seed_users(repo: &InMemoryRepository) -> (UserId, UserId) {
        let a = repo
            .insert_user(NewUserRecord::from_identity(
                &Identity::new("tok-a").with_name("Ana"),
            ))
            .await
            .unwrap();
        let b = repo
            .insert_user(NewUserRecord::from_identity(&Identity::new("tok-b")))
            .await
            .unwrap();
        (a, b)
    }

    fn draft() -> ChallengeDraft {
        ChallengeDraft::new(
            "Leg Day",
            day("2024-01-10"),
            vec![ExerciseDraft::new("Squats", 30), ExerciseDraft::new("Lunges", 20)],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn duplicate_token_conflicts() {
        let repo = InMemoryRepository::new();
        seed_users(&repo).await;
        let err = repo
            .insert_user(NewUserRecord::from_identity(&Identity::new("tok-a")))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn missing_name_defaults() {
        let repo = InMemoryRepository::new();
        let (_, b) = seed_users(&repo).await;
        assert_eq!(repo.get_user(b).await.unwrap().unwrap().name(), "No name");
    }

    #[tokio::test]
    async fn challenge_insert_and_cascade_delete() {
        let repo = InMemoryRepository::new();
        let (a, b) = seed_users(&repo).await;
        let created = repo
            .insert_challenge(NewChallengeRecord::from_draft(&draft(), a, &[b]))
            .await
            .unwrap();
        assert_eq!(created.exercise_ids.len(), 2);
        assert_eq!(created.participant_ids.len(), 2);

        let exercises = repo
            .exercises_for_challenge(created.challenge_id)
            .await
            .unwrap();
        assert_eq!(exercises[0].name(), "Squats");
        assert_eq!(exercises[1].order(), 1);

        let invitee = repo
            .get_participant(created.participant_ids[1])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(invitee.status(), ParticipantStatus::Invited);

        repo.upsert_progress(created.exercise_ids[0], a, created.challenge_id, 10)
            .await
            .unwrap();
        repo.delete_challenge(created.challenge_id).await.unwrap();

        assert!(repo.get_challenge(created.challenge_id).await.unwrap().is_none());
        assert!(repo
            .progress_for_challenge(created.challenge_id)
            .await
            .unwrap()
            .is_empty());
        assert!(repo.participations_for_user(b).await.unwrap().is_empty());
        assert!(matches!(
            repo.delete_challenge(created.challenge_id).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn duplicate_participant_conflicts_without_writing() {
        let repo = InMemoryRepository::new();
        let (a, _) = seed_users(&repo).await;
        let err = repo
            .insert_challenge(NewChallengeRecord::from_draft(&draft(), a, &[a]))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
        assert!(repo.participations_for_user(a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn progress_upsert_is_last_write_wins() {
        let repo = InMemoryRepository::new();
        let (a, _) = seed_users(&repo).await;
        let created = repo
            .insert_challenge(NewChallengeRecord::from_draft(&draft(), a, &[]))
            .await
            .unwrap();
        let exercise = created.exercise_ids[0];

        let first = repo
            .upsert_progress(exercise, a, created.challenge_id, 5)
            .await
            .unwrap();
        let second = repo
            .upsert_progress(exercise, a, created.challenge_id, 40)
            .await
            .unwrap();
        assert_eq!(first, second);
        let record = repo.get_progress(exercise, a).await.unwrap().unwrap();
        assert_eq!(record.completed_reps, 40);
        assert_eq!(
            repo.progress_for_challenge(created.challenge_id)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn accepting_request_creates_symmetric_pair() {
        let repo = InMemoryRepository::new();
        let (a, b) = seed_users(&repo).await;
        let request = repo.insert_friend_request(a, b, fixed_now()).await.unwrap();
        repo.accept_friend_request(request).await.unwrap();

        assert!(repo.get_friend_request(request).await.unwrap().is_none());
        assert!(repo.find_friendship(a, b).await.unwrap().is_some());
        assert!(repo.find_friendship(b, a).await.unwrap().is_some());

        assert_eq!(repo.delete_friendship_pair(b, a).await.unwrap(), 2);
        assert!(repo.friendships_for_user(a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn notifications_list_newest_first_and_track_unread() {
        let repo = InMemoryRepository::new();
        let (a, _) = seed_users(&repo).await;
        for (i, message) in ["first", "second"].iter().enumerate() {
            repo.insert_notification(NewNotificationRecord {
                user_id: a,
                message: (*message).to_owned(),
                kind: NotificationKind::Info,
                related_id: None,
                created_at: fixed_now() + chrono::Duration::minutes(i64::try_from(i).unwrap()),
            })
            .await
            .unwrap();
        }
        let listed = repo.notifications_for_user(a).await.unwrap();
        assert_eq!(listed[0].message, "second");
        assert_eq!(repo.unread_count(a).await.unwrap(), 2);

        repo.mark_read(listed[0].id).await.unwrap();
        assert_eq!(repo.unread_count(a).await.unwrap(), 1);
        assert_eq!(repo.mark_all_read(a).await.unwrap(), 1);
        assert_eq!(repo.delete_all_for_user(a).await.unwrap(), 2);
    }
}
