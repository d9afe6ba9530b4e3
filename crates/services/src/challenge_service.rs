use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use challenge_core::aggregate::{self, LeaderboardEntry, PastChallengeSummary};
use challenge_core::model::{
    Challenge, ChallengeDraft, ChallengeId, Exercise, ExerciseDraft, ExerciseId,
    NotificationKind, Participant, ParticipantId, ParticipantStatus, User, UserId,
};
use challenge_core::{CalendarDay, Clock};
use serde::Serialize;
use storage::repository::{
    ChallengeRepository, FriendshipRepository, NewChallengeRecord, ParticipantRepository,
    ProgressRepository, UserRepository,
};

use crate::auth::current_user;
use crate::error::ChallengeServiceError;
use crate::notifier::Notifier;
use crate::snapshot::SnapshotLoader;

//
// ─── VIEWS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedChallengeView {
    pub challenge_id: ChallengeId,
    pub exercise_ids: Vec<ExerciseId>,
}

/// One entry of the caller's challenge list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeListItem {
    #[serde(flatten)]
    pub challenge: Challenge,
    pub exercises: Vec<Exercise>,
    pub participant_count: usize,
    pub creator: Option<User>,
    pub user_status: ParticipantStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantWithUser {
    #[serde(flatten)]
    pub participant: Participant,
    pub user: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeDetails {
    #[serde(flatten)]
    pub challenge: Challenge,
    pub exercises: Vec<Exercise>,
    pub participants: Vec<ParticipantWithUser>,
    pub creator: Option<User>,
    pub user_status: ParticipantStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    #[serde(flatten)]
    pub entry: LeaderboardEntry,
    pub user: Option<User>,
}

/// A challenge dated today with its leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodaysChallenge {
    #[serde(flatten)]
    pub challenge: Challenge,
    pub exercises: Vec<Exercise>,
    pub participants: Vec<LeaderboardRow>,
    pub creator: Option<User>,
    pub current_user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInvitation {
    pub participant_id: ParticipantId,
    pub challenge_id: ChallengeId,
    pub challenge_name: String,
    pub date: CalendarDay,
    pub creator_name: String,
    pub exercise_count: usize,
    pub participant_count: usize,
}

const UNKNOWN_CREATOR: &str = "Unknown";

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Challenge lifecycle: creation, invitations, views, deletion.
#[derive(Clone)]
pub struct ChallengeService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    challenges: Arc<dyn ChallengeRepository>,
    participants: Arc<dyn ParticipantRepository>,
    progress: Arc<dyn ProgressRepository>,
    friendships: Arc<dyn FriendshipRepository>,
    snapshots: SnapshotLoader,
    notifier: Notifier,
}

impl ChallengeService {
    #[must_use]
    pub fn new(
        clock: Clock,
        users: Arc<dyn UserRepository>,
        challenges: Arc<dyn ChallengeRepository>,
        participants: Arc<dyn ParticipantRepository>,
        progress: Arc<dyn ProgressRepository>,
        friendships: Arc<dyn FriendshipRepository>,
        notifier: Notifier,
    ) -> Self {
        let snapshots = SnapshotLoader::new(
            Arc::clone(&challenges),
            Arc::clone(&participants),
            Arc::clone(&progress),
        );
        Self {
            clock,
            users,
            challenges,
            participants,
            progress,
            friendships,
            snapshots,
            notifier,
        }
    }

    async fn caller(&self, token: Option<&str>) -> Result<User, ChallengeServiceError> {
        Ok(current_user(self.users.as_ref(), token).await?)
    }

    async fn users_by_id(
        &self,
        ids: impl IntoIterator<Item = UserId>,
    ) -> Result<HashMap<UserId, User>, ChallengeServiceError> {
        let mut found = HashMap::new();
        for id in ids {
            if found.contains_key(&id) {
                continue;
            }
            if let Some(user) = self.users.get_user(id).await? {
                found.insert(id, user);
            }
        }
        Ok(found)
    }

    /// Create a challenge, invite friends, and notify each invitee.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeServiceError::Challenge` for invalid name or exercises,
    /// `InviteeNotFound` / `NotFriends` for bad invitees, `Storage` on
    /// persistence failure.
    pub async fn create_challenge(
        &self,
        token: Option<&str>,
        name: &str,
        date: CalendarDay,
        exercises: Vec<ExerciseDraft>,
        friend_ids: &[UserId],
    ) -> Result<CreatedChallengeView, ChallengeServiceError> {
        let me = self.caller(token).await?;
        let draft = ChallengeDraft::new(name, date, exercises)?;

        let mut invitees = Vec::with_capacity(friend_ids.len());
        let mut seen = HashSet::new();
        for friend_id in friend_ids {
            if *friend_id == me.id() || !seen.insert(*friend_id) {
                continue;
            }
            if self.users.get_user(*friend_id).await?.is_none() {
                return Err(ChallengeServiceError::InviteeNotFound);
            }
            if self
                .friendships
                .find_friendship(me.id(), *friend_id)
                .await?
                .is_none()
            {
                return Err(ChallengeServiceError::NotFriends);
            }
            invitees.push(*friend_id);
        }

        let created = self
            .challenges
            .insert_challenge(NewChallengeRecord::from_draft(&draft, me.id(), &invitees))
            .await?;
        tracing::info!(
            challenge = %created.challenge_id,
            creator = %me.id(),
            invitees = invitees.len(),
            "challenge created"
        );

        // Participant ids follow the record order: creator first, then invitees.
        for (invitee, participant_id) in invitees
            .iter()
            .zip(created.participant_ids.iter().skip(1))
        {
            self.notifier
                .send(
                    *invitee,
                    format!(
                        "{} invited you to the challenge \"{}\" on {}",
                        me.name(),
                        draft.name(),
                        draft.date()
                    ),
                    NotificationKind::ChallengeInvitation,
                    Some(participant_id.to_string()),
                )
                .await;
        }

        Ok(CreatedChallengeView {
            challenge_id: created.challenge_id,
            exercise_ids: created.exercise_ids,
        })
    }

    /// Every challenge the caller has a row for, newest date first.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeServiceError::Auth` or `Storage`.
    pub async fn user_challenges(
        &self,
        token: Option<&str>,
    ) -> Result<Vec<ChallengeListItem>, ChallengeServiceError> {
        let me = self.caller(token).await?;
        let rows = self.participants.participations_for_user(me.id()).await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(challenge) = self.challenges.get_challenge(row.challenge_id()).await? else {
                continue;
            };
            let exercises = self
                .challenges
                .exercises_for_challenge(challenge.id())
                .await?;
            let participant_count = self
                .participants
                .participants_for_challenge(challenge.id())
                .await?
                .len();
            let creator = self.users.get_user(challenge.creator_id()).await?;
            items.push(ChallengeListItem {
                challenge,
                exercises,
                participant_count,
                creator,
                user_status: row.status(),
            });
        }
        items.sort_by_key(|item| Reverse(item.challenge.date()));
        Ok(items)
    }

    /// Full details of one challenge; the caller must have a row in it.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeNotFound`, `NotParticipant`, `Auth` or `Storage`.
    pub async fn challenge_details(
        &self,
        token: Option<&str>,
        challenge_id: ChallengeId,
    ) -> Result<ChallengeDetails, ChallengeServiceError> {
        let me = self.caller(token).await?;
        let challenge = self
            .challenges
            .get_challenge(challenge_id)
            .await?
            .ok_or(ChallengeServiceError::ChallengeNotFound)?;
        let mine = self
            .participants
            .find_participant(challenge_id, me.id())
            .await?
            .ok_or(ChallengeServiceError::NotParticipant)?;

        let exercises = self.challenges.exercises_for_challenge(challenge_id).await?;
        let participants = self
            .participants
            .participants_for_challenge(challenge_id)
            .await?;
        let mut users = self
            .users_by_id(
                participants
                    .iter()
                    .map(Participant::user_id)
                    .chain([challenge.creator_id()]),
            )
            .await?;

        let creator = users.get(&challenge.creator_id()).cloned();
        let participants = participants
            .into_iter()
            .map(|participant| ParticipantWithUser {
                user: users.remove(&participant.user_id()),
                participant,
            })
            .collect();

        Ok(ChallengeDetails {
            challenge,
            exercises,
            participants,
            creator,
            user_status: mine.status(),
        })
    }

    /// Active challenges dated today (in `timezone`) with leaderboards.
    ///
    /// Returns `None` when the caller has nothing today.
    ///
    /// # Errors
    ///
    /// Returns `Time` for an unknown timezone, `Auth` or `Storage`.
    pub async fn todays_challenges(
        &self,
        token: Option<&str>,
        timezone: Option<&str>,
    ) -> Result<Option<Vec<TodaysChallenge>>, ChallengeServiceError> {
        let me = self.caller(token).await?;
        let today = self.clock.today_in(timezone)?;
        let snapshots = self.snapshots.load_for_user(me.id()).await?;

        let todays = aggregate::challenges_on(&snapshots, today);
        if todays.is_empty() {
            return Ok(None);
        }

        let mut views = Vec::with_capacity(todays.len());
        for snapshot in todays {
            let mut users = self
                .users_by_id(
                    snapshot
                        .participants
                        .iter()
                        .map(Participant::user_id)
                        .chain([snapshot.challenge.creator_id()]),
                )
                .await?;
            let creator = users.get(&snapshot.challenge.creator_id()).cloned();
            let participants = snapshot
                .leaderboard()
                .into_iter()
                .map(|entry| LeaderboardRow {
                    user: users.remove(&entry.progress.user_id),
                    entry,
                })
                .collect();
            views.push(TodaysChallenge {
                challenge: snapshot.challenge.clone(),
                exercises: snapshot.ordered_exercises().into_iter().cloned().collect(),
                participants,
                creator,
                current_user_id: me.id(),
            });
        }
        Ok(Some(views))
    }

    /// Joined challenges dated strictly before today, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Time` for an unknown timezone, `Auth` or `Storage`.
    pub async fn past_challenges(
        &self,
        token: Option<&str>,
        timezone: Option<&str>,
    ) -> Result<Vec<PastChallengeSummary>, ChallengeServiceError> {
        let me = self.caller(token).await?;
        let today = self.clock.today_in(timezone)?;
        let snapshots = self.snapshots.load_for_user(me.id()).await?;
        Ok(aggregate::past_challenges(&snapshots, me.id(), today))
    }

    /// Invitations still awaiting the caller's answer.
    ///
    /// # Errors
    ///
    /// Returns `Auth` or `Storage`.
    pub async fn pending_invitations(
        &self,
        token: Option<&str>,
    ) -> Result<Vec<PendingInvitation>, ChallengeServiceError> {
        let me = self.caller(token).await?;
        let rows = self.participants.participations_for_user(me.id()).await?;

        let mut pending = Vec::new();
        for row in rows.into_iter().filter(Participant::is_invited) {
            let Some(challenge) = self.challenges.get_challenge(row.challenge_id()).await? else {
                continue;
            };
            let creator_name = self
                .users
                .get_user(challenge.creator_id())
                .await?
                .map_or_else(|| UNKNOWN_CREATOR.to_owned(), |u| u.name().to_owned());
            let exercise_count = self
                .challenges
                .exercises_for_challenge(challenge.id())
                .await?
                .len();
            let participant_count = self
                .participants
                .participants_for_challenge(challenge.id())
                .await?
                .len();
            pending.push(PendingInvitation {
                participant_id: row.id(),
                challenge_id: challenge.id(),
                challenge_name: challenge.name().to_owned(),
                date: challenge.date(),
                creator_name,
                exercise_count,
                participant_count,
            });
        }
        Ok(pending)
    }

    async fn owned_invitation(
        &self,
        me: &User,
        participant_id: ParticipantId,
    ) -> Result<Participant, ChallengeServiceError> {
        let row = self
            .participants
            .get_participant(participant_id)
            .await?
            .ok_or(ChallengeServiceError::InvitationNotFound)?;
        if row.user_id() != me.id() {
            return Err(ChallengeServiceError::NotInvitationOwner);
        }
        row.ensure_invited()?;
        Ok(row)
    }

    /// Accept an invitation and tell the creator.
    ///
    /// # Errors
    ///
    /// Returns `InvitationNotFound`, `NotInvitationOwner`,
    /// `Participant(AlreadyProcessed)`, `Auth` or `Storage`.
    pub async fn accept_invitation(
        &self,
        token: Option<&str>,
        participant_id: ParticipantId,
    ) -> Result<(), ChallengeServiceError> {
        let me = self.caller(token).await?;
        let row = self.owned_invitation(&me, participant_id).await?;
        self.respond(&me, row, true).await?;
        Ok(())
    }

    /// Decline an invitation (the row is deleted) and tell the creator.
    ///
    /// # Errors
    ///
    /// Same as [`Self::accept_invitation`].
    pub async fn decline_invitation(
        &self,
        token: Option<&str>,
        participant_id: ParticipantId,
    ) -> Result<(), ChallengeServiceError> {
        let me = self.caller(token).await?;
        let row = self.owned_invitation(&me, participant_id).await?;
        self.respond(&me, row, false).await?;
        Ok(())
    }

    /// Applies an answer to an already verified `invited` row.
    pub(crate) async fn respond(
        &self,
        me: &User,
        mut row: Participant,
        accept: bool,
    ) -> Result<(), ChallengeServiceError> {
        if accept {
            row.accept()?;
            self.participants
                .update_participant_status(row.id(), row.status())
                .await?;
        } else {
            self.participants.delete_participant(row.id()).await?;
        }
        let verb = if accept { "accepted" } else { "declined" };
        tracing::info!(participant = %row.id(), user = %me.id(), "invitation {verb}");

        if let Some(challenge) = self.challenges.get_challenge(row.challenge_id()).await? {
            self.notifier
                .send(
                    challenge.creator_id(),
                    format!(
                        "{} {verb} your invitation to \"{}\"",
                        me.name(),
                        challenge.name()
                    ),
                    NotificationKind::Info,
                    None,
                )
                .await;
        }
        Ok(())
    }

    /// Delete a challenge with everything under it; creator only.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeNotFound`, `NotCreator`, `Auth` or `Storage`.
    pub async fn delete_challenge(
        &self,
        token: Option<&str>,
        challenge_id: ChallengeId,
    ) -> Result<(), ChallengeServiceError> {
        let me = self.caller(token).await?;
        let challenge = self
            .challenges
            .get_challenge(challenge_id)
            .await?
            .ok_or(ChallengeServiceError::ChallengeNotFound)?;
        if !challenge.is_created_by(me.id()) {
            return Err(ChallengeServiceError::NotCreator);
        }

        let participants = self
            .participants
            .participants_for_challenge(challenge_id)
            .await?;
        self.challenges.delete_challenge(challenge_id).await?;
        tracing::info!(challenge = %challenge_id, "challenge deleted");

        for participant in participants
            .iter()
            .filter(|p| p.user_id() != me.id())
        {
            self.notifier
                .send(
                    participant.user_id(),
                    format!(
                        "Challenge \"{}\" has been cancelled by {}",
                        challenge.name(),
                        me.name()
                    ),
                    NotificationKind::Info,
                    None,
                )
                .await;
        }
        Ok(())
    }

    /// Leave a challenge, dropping the caller's progress; not for the creator.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeNotFound`, `CreatorCannotLeave`, `NotParticipant`,
    /// `Auth` or `Storage`.
    pub async fn leave_challenge(
        &self,
        token: Option<&str>,
        challenge_id: ChallengeId,
    ) -> Result<(), ChallengeServiceError> {
        let me = self.caller(token).await?;
        let challenge = self
            .challenges
            .get_challenge(challenge_id)
            .await?
            .ok_or(ChallengeServiceError::ChallengeNotFound)?;
        if challenge.is_created_by(me.id()) {
            return Err(ChallengeServiceError::CreatorCannotLeave);
        }
        let row = self
            .participants
            .find_participant(challenge_id, me.id())
            .await?
            .ok_or(ChallengeServiceError::NotParticipant)?;

        let removed = self
            .progress
            .delete_progress_for_user(challenge_id, me.id())
            .await?;
        self.participants.delete_participant(row.id()).await?;
        tracing::info!(challenge = %challenge_id, user = %me.id(), removed, "left challenge");

        self.notifier
            .send(
                challenge.creator_id(),
                format!("{} left your challenge \"{}\"", me.name(), challenge.name()),
                NotificationKind::Info,
                None,
            )
            .await;
        Ok(())
    }
}
