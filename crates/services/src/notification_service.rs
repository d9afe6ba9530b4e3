use std::str::FromStr;
use std::sync::Arc;

use challenge_core::model::{
    FriendRequest, FriendRequestId, Notification, NotificationId, NotificationKind, ParticipantId,
    User, UserId,
};
use storage::repository::{
    FriendshipRepository, NotificationRepository, ParticipantRepository, UserRepository,
};

use crate::auth::current_user;
use crate::challenge_service::ChallengeService;
use crate::error::{ChallengeServiceError, FriendshipServiceError, NotificationServiceError};
use crate::friendship_service::FriendshipService;
use crate::notifier::Notifier;

/// Inbox queries and the actions a notification can carry.
#[derive(Clone)]
pub struct NotificationService {
    users: Arc<dyn UserRepository>,
    notifications: Arc<dyn NotificationRepository>,
    participants: Arc<dyn ParticipantRepository>,
    friendships: Arc<dyn FriendshipRepository>,
    notifier: Notifier,
    challenge_service: ChallengeService,
    friendship_service: FriendshipService,
}

impl NotificationService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        notifications: Arc<dyn NotificationRepository>,
        participants: Arc<dyn ParticipantRepository>,
        friendships: Arc<dyn FriendshipRepository>,
        notifier: Notifier,
        challenge_service: ChallengeService,
        friendship_service: FriendshipService,
    ) -> Self {
        Self {
            users,
            notifications,
            participants,
            friendships,
            notifier,
            challenge_service,
            friendship_service,
        }
    }

    async fn caller(&self, token: Option<&str>) -> Result<User, NotificationServiceError> {
        Ok(current_user(self.users.as_ref(), token).await?)
    }

    async fn owned(
        &self,
        me: &User,
        id: NotificationId,
    ) -> Result<Notification, NotificationServiceError> {
        let notification = self
            .notifications
            .get_notification(id)
            .await?
            .ok_or(NotificationServiceError::NotFound)?;
        if notification.user_id != me.id() {
            return Err(NotificationServiceError::Unauthorized);
        }
        Ok(notification)
    }

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `Auth` or `Storage`.
    pub async fn notifications(
        &self,
        token: Option<&str>,
    ) -> Result<Vec<Notification>, NotificationServiceError> {
        let me = self.caller(token).await?;
        Ok(self.notifications.notifications_for_user(me.id()).await?)
    }

    /// # Errors
    ///
    /// Returns `Auth` or `Storage`.
    pub async fn unread_count(&self, token: Option<&str>) -> Result<u64, NotificationServiceError> {
        let me = self.caller(token).await?;
        Ok(self.notifications.unread_count(me.id()).await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound`, `Unauthorized`, `Auth` or `Storage`.
    pub async fn mark_as_read(
        &self,
        token: Option<&str>,
        id: NotificationId,
    ) -> Result<(), NotificationServiceError> {
        let me = self.caller(token).await?;
        self.owned(&me, id).await?;
        self.notifications.mark_read(id).await?;
        Ok(())
    }

    /// Returns how many notifications changed.
    ///
    /// # Errors
    ///
    /// Returns `Auth` or `Storage`.
    pub async fn mark_all_as_read(
        &self,
        token: Option<&str>,
    ) -> Result<u64, NotificationServiceError> {
        let me = self.caller(token).await?;
        Ok(self.notifications.mark_all_read(me.id()).await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound`, `Unauthorized`, `Auth` or `Storage`.
    pub async fn delete_notification(
        &self,
        token: Option<&str>,
        id: NotificationId,
    ) -> Result<(), NotificationServiceError> {
        let me = self.caller(token).await?;
        self.owned(&me, id).await?;
        self.notifications.delete_notification(id).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `Auth` or `Storage`.
    pub async fn clear_all(&self, token: Option<&str>) -> Result<u64, NotificationServiceError> {
        let me = self.caller(token).await?;
        Ok(self.notifications.delete_all_for_user(me.id()).await?)
    }

    /// Unauthenticated insert used by fan-out from other handlers.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the insert fails.
    pub async fn create_notification(
        &self,
        user_id: UserId,
        message: String,
        kind: NotificationKind,
        related_id: Option<String>,
    ) -> Result<NotificationId, NotificationServiceError> {
        Ok(self
            .notifier
            .create(user_id, message, kind, related_id)
            .await?)
    }

    /// Checks ownership and kind, parses the related id, then deletes the
    /// notification before anything else happens.
    async fn consume<T: FromStr>(
        &self,
        me: &User,
        id: NotificationId,
        kind: NotificationKind,
    ) -> Result<T, NotificationServiceError> {
        let notification = self.owned(me, id).await?;
        if notification.kind != kind {
            return Err(NotificationServiceError::InvalidKind);
        }
        let related = notification
            .related_id
            .as_deref()
            .and_then(|raw| raw.parse::<T>().ok())
            .ok_or(NotificationServiceError::InvalidKind)?;
        self.notifications.delete_notification(id).await?;
        Ok(related)
    }

    /// # Errors
    ///
    /// Returns `NotFound`, `Unauthorized`, `InvalidKind`,
    /// `InvalidFriendRequest` when the request is addressed to someone else,
    /// `Auth` or `Storage`. An already handled request is not an error.
    pub async fn accept_friend_request_from_notification(
        &self,
        token: Option<&str>,
        id: NotificationId,
    ) -> Result<(), NotificationServiceError> {
        let me = self.caller(token).await?;
        let Some(request) = self.related_friend_request(&me, id).await? else {
            return Ok(());
        };
        self.friendship_service
            .complete_accept(&me, &request)
            .await
            .map_err(friendship_error)
    }

    /// # Errors
    ///
    /// Same as [`Self::accept_friend_request_from_notification`].
    pub async fn decline_friend_request_from_notification(
        &self,
        token: Option<&str>,
        id: NotificationId,
    ) -> Result<(), NotificationServiceError> {
        let me = self.caller(token).await?;
        let Some(request) = self.related_friend_request(&me, id).await? else {
            return Ok(());
        };
        self.friendships.delete_friend_request(request.id).await?;
        Ok(())
    }

    async fn related_friend_request(
        &self,
        me: &User,
        id: NotificationId,
    ) -> Result<Option<FriendRequest>, NotificationServiceError> {
        let request_id: FriendRequestId =
            self.consume(me, id, NotificationKind::FriendRequest).await?;
        let Some(request) = self.friendships.get_friend_request(request_id).await? else {
            tracing::debug!(request = %request_id, "friend request already handled");
            return Ok(None);
        };
        if request.recipient_id != me.id() {
            return Err(NotificationServiceError::InvalidFriendRequest);
        }
        Ok(Some(request))
    }

    /// # Errors
    ///
    /// Returns `NotFound`, `Unauthorized`, `InvalidKind`,
    /// `NotInvitationOwner`, `Auth` or `Storage`. An invitation that is gone
    /// or already answered is not an error.
    pub async fn accept_challenge_from_notification(
        &self,
        token: Option<&str>,
        id: NotificationId,
    ) -> Result<(), NotificationServiceError> {
        self.answer_invitation(token, id, true).await
    }

    /// # Errors
    ///
    /// Same as [`Self::accept_challenge_from_notification`].
    pub async fn decline_challenge_from_notification(
        &self,
        token: Option<&str>,
        id: NotificationId,
    ) -> Result<(), NotificationServiceError> {
        self.answer_invitation(token, id, false).await
    }

    async fn answer_invitation(
        &self,
        token: Option<&str>,
        id: NotificationId,
        accept: bool,
    ) -> Result<(), NotificationServiceError> {
        let me = self.caller(token).await?;
        let participant_id: ParticipantId = self
            .consume(&me, id, NotificationKind::ChallengeInvitation)
            .await?;
        let Some(row) = self.participants.get_participant(participant_id).await? else {
            return Ok(());
        };
        if row.user_id() != me.id() {
            return Err(NotificationServiceError::NotInvitationOwner);
        }
        if !row.is_invited() {
            return Ok(());
        }
        self.challenge_service
            .respond(&me, row, accept)
            .await
            .map_err(challenge_error)
    }
}

fn friendship_error(err: FriendshipServiceError) -> NotificationServiceError {
    match err {
        FriendshipServiceError::Auth(e) => NotificationServiceError::Auth(e),
        FriendshipServiceError::Storage(e) => NotificationServiceError::Storage(e),
        _ => NotificationServiceError::InvalidFriendRequest,
    }
}

fn challenge_error(err: ChallengeServiceError) -> NotificationServiceError {
    match err {
        ChallengeServiceError::Auth(e) => NotificationServiceError::Auth(e),
        ChallengeServiceError::Storage(e) => NotificationServiceError::Storage(e),
        _ => NotificationServiceError::NotInvitationOwner,
    }
}
