use std::collections::HashSet;
use std::sync::Arc;

use challenge_core::Clock;
use challenge_core::model::{
    FriendRequest, FriendRequestId, Friendship, NotificationKind, User, UserId,
};
use serde::Serialize;
use storage::repository::{FriendshipRepository, UserRepository};

use crate::auth::current_user;
use crate::error::FriendshipServiceError;
use crate::notifier::Notifier;

pub const SEARCH_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendView {
    #[serde(flatten)]
    pub friendship: Friendship,
    pub friend: User,
}

/// A request addressed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingRequest {
    #[serde(flatten)]
    pub request: FriendRequest,
    pub requester: User,
}

/// A request the caller sent; `friend` is the recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentRequest {
    #[serde(flatten)]
    pub request: FriendRequest,
    pub friend: User,
}

#[derive(Clone)]
pub struct FriendshipService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    friendships: Arc<dyn FriendshipRepository>,
    notifier: Notifier,
}

impl FriendshipService {
    #[must_use]
    pub fn new(
        clock: Clock,
        users: Arc<dyn UserRepository>,
        friendships: Arc<dyn FriendshipRepository>,
        notifier: Notifier,
    ) -> Self {
        Self {
            clock,
            users,
            friendships,
            notifier,
        }
    }

    async fn caller(&self, token: Option<&str>) -> Result<User, FriendshipServiceError> {
        Ok(current_user(self.users.as_ref(), token).await?)
    }

    /// Users matching `term` on name or email, case-insensitive, minus the
    /// caller, existing friends and anyone with a pending request either way.
    ///
    /// # Errors
    ///
    /// Returns `Auth` or `Storage`.
    pub async fn search_users(
        &self,
        token: Option<&str>,
        term: &str,
    ) -> Result<Vec<User>, FriendshipServiceError> {
        let me = self.caller(token).await?;
        let term = term.to_lowercase();

        let mut excluded: HashSet<UserId> = HashSet::from([me.id()]);
        excluded.extend(
            self.friendships
                .friendships_for_user(me.id())
                .await?
                .into_iter()
                .map(|f| f.friend_id),
        );
        excluded.extend(
            self.friendships
                .requests_from(me.id())
                .await?
                .into_iter()
                .map(|r| r.recipient_id),
        );
        excluded.extend(
            self.friendships
                .requests_to(me.id())
                .await?
                .into_iter()
                .map(|r| r.requester_id),
        );

        Ok(self
            .users
            .list_users()
            .await?
            .into_iter()
            .filter(|u| !excluded.contains(&u.id()) && u.matches_search(&term))
            .take(SEARCH_LIMIT)
            .collect())
    }

    /// # Errors
    ///
    /// Returns `Auth` or `Storage`.
    pub async fn friends(
        &self,
        token: Option<&str>,
    ) -> Result<Vec<FriendView>, FriendshipServiceError> {
        let me = self.caller(token).await?;
        let mut views = Vec::new();
        for friendship in self.friendships.friendships_for_user(me.id()).await? {
            if let Some(friend) = self.users.get_user(friendship.friend_id).await? {
                views.push(FriendView { friendship, friend });
            }
        }
        Ok(views)
    }

    /// # Errors
    ///
    /// Returns `Auth` or `Storage`.
    pub async fn pending_requests(
        &self,
        token: Option<&str>,
    ) -> Result<Vec<IncomingRequest>, FriendshipServiceError> {
        let me = self.caller(token).await?;
        let mut views = Vec::new();
        for request in self.friendships.requests_to(me.id()).await? {
            if let Some(requester) = self.users.get_user(request.requester_id).await? {
                views.push(IncomingRequest { request, requester });
            }
        }
        Ok(views)
    }

    /// # Errors
    ///
    /// Returns `Auth` or `Storage`.
    pub async fn sent_requests(
        &self,
        token: Option<&str>,
    ) -> Result<Vec<SentRequest>, FriendshipServiceError> {
        let me = self.caller(token).await?;
        let mut views = Vec::new();
        for request in self.friendships.requests_from(me.id()).await? {
            if let Some(friend) = self.users.get_user(request.recipient_id).await? {
                views.push(SentRequest { request, friend });
            }
        }
        Ok(views)
    }

    /// Send a request and drop a `friend_request` notification in the
    /// recipient's inbox.
    ///
    /// # Errors
    ///
    /// Returns `SelfRequest`, `TargetNotFound`, `AlreadyFriends`,
    /// `RequestAlreadySent`, `RequestAlreadyReceived`, `Auth` or `Storage`.
    pub async fn send_friend_request(
        &self,
        token: Option<&str>,
        friend_id: UserId,
    ) -> Result<FriendRequestId, FriendshipServiceError> {
        let me = self.caller(token).await?;
        if me.id() == friend_id {
            return Err(FriendshipServiceError::SelfRequest);
        }
        if self.users.get_user(friend_id).await?.is_none() {
            return Err(FriendshipServiceError::TargetNotFound);
        }
        if self
            .friendships
            .find_friendship(me.id(), friend_id)
            .await?
            .is_some()
        {
            return Err(FriendshipServiceError::AlreadyFriends);
        }
        if self
            .friendships
            .find_friend_request(me.id(), friend_id)
            .await?
            .is_some()
        {
            return Err(FriendshipServiceError::RequestAlreadySent);
        }
        if self
            .friendships
            .find_friend_request(friend_id, me.id())
            .await?
            .is_some()
        {
            return Err(FriendshipServiceError::RequestAlreadyReceived);
        }

        let request_id = self
            .friendships
            .insert_friend_request(me.id(), friend_id, self.clock.now())
            .await?;
        tracing::info!(request = %request_id, from = %me.id(), to = %friend_id, "friend request sent");

        self.notifier
            .send(
                friend_id,
                format!("{} sent you a friend request", me.name()),
                NotificationKind::FriendRequest,
                Some(request_id.to_string()),
            )
            .await;
        Ok(request_id)
    }

    async fn incoming(
        &self,
        me: &User,
        request_id: FriendRequestId,
    ) -> Result<FriendRequest, FriendshipServiceError> {
        let request = self
            .friendships
            .get_friend_request(request_id)
            .await?
            .ok_or(FriendshipServiceError::RequestNotFound)?;
        if request.recipient_id != me.id() {
            return Err(FriendshipServiceError::InvalidRequest);
        }
        Ok(request)
    }

    /// # Errors
    ///
    /// Returns `RequestNotFound`, `InvalidRequest` when the caller is not the
    /// recipient, `Auth` or `Storage`.
    pub async fn accept_friend_request(
        &self,
        token: Option<&str>,
        request_id: FriendRequestId,
    ) -> Result<(), FriendshipServiceError> {
        let me = self.caller(token).await?;
        let request = self.incoming(&me, request_id).await?;
        self.complete_accept(&me, &request).await
    }

    /// Turns a verified incoming request into a friendship pair.
    pub(crate) async fn complete_accept(
        &self,
        me: &User,
        request: &FriendRequest,
    ) -> Result<(), FriendshipServiceError> {
        self.friendships.accept_friend_request(request.id).await?;
        tracing::info!(request = %request.id, user = %me.id(), "friend request accepted");
        self.notifier
            .send(
                request.requester_id,
                format!("{} accepted your friend request", me.name()),
                NotificationKind::Info,
                None,
            )
            .await;
        Ok(())
    }

    /// # Errors
    ///
    /// Same as [`Self::accept_friend_request`].
    pub async fn reject_friend_request(
        &self,
        token: Option<&str>,
        request_id: FriendRequestId,
    ) -> Result<(), FriendshipServiceError> {
        let me = self.caller(token).await?;
        let request = self.incoming(&me, request_id).await?;
        self.friendships.delete_friend_request(request.id).await?;
        Ok(())
    }

    /// Remove both directions of a friendship. Missing rows are fine.
    ///
    /// # Errors
    ///
    /// Returns `Auth` or `Storage`.
    pub async fn remove_friend(
        &self,
        token: Option<&str>,
        friend_id: UserId,
    ) -> Result<(), FriendshipServiceError> {
        let me = self.caller(token).await?;
        let removed = self
            .friendships
            .delete_friendship_pair(me.id(), friend_id)
            .await?;
        tracing::info!(user = %me.id(), friend = %friend_id, removed, "friend removed");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RequestNotFound`, `NotRequester`, `Auth` or `Storage`.
    pub async fn cancel_friend_request(
        &self,
        token: Option<&str>,
        request_id: FriendRequestId,
    ) -> Result<(), FriendshipServiceError> {
        let me = self.caller(token).await?;
        let request = self
            .friendships
            .get_friend_request(request_id)
            .await?
            .ok_or(FriendshipServiceError::RequestNotFound)?;
        if request.requester_id != me.id() {
            return Err(FriendshipServiceError::NotRequester);
        }
        self.friendships.delete_friend_request(request_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use challenge_core::model::Identity;
    use challenge_core::time::fixed_clock;
    use storage::repository::{
        InMemoryRepository, NewUserRecord, NotificationRepository, Storage,
    };

    async fn setup() -> (InMemoryRepository, FriendshipService, Vec<UserId>) {
        let repo = InMemoryRepository::new();
        let storage = Storage::from_repository(repo.clone());
        let mut ids = Vec::new();
        for (token, name, email) in [
            ("tok-ana", "Ana", "ana@gym.io"),
            ("tok-ben", "Ben", "ben@gym.io"),
            ("tok-cat", "Cat", "cat@run.io"),
        ] {
            ids.push(
                repo.insert_user(NewUserRecord::from_identity(
                    &Identity::new(token).with_name(name).with_email(email),
                ))
                .await
                .unwrap(),
            );
        }
        let clock = fixed_clock();
        let service = FriendshipService::new(
            clock,
            storage.users,
            storage.friendships,
            Notifier::new(clock, storage.notifications),
        );
        (repo, service, ids)
    }

    #[tokio::test]
    async fn send_checks_and_notifies() {
        let (repo, service, ids) = setup().await;
        let (ana, ben) = (ids[0], ids[1]);

        assert!(matches!(
            service.send_friend_request(Some("tok-ana"), ana).await,
            Err(FriendshipServiceError::SelfRequest)
        ));
        assert!(matches!(
            service
                .send_friend_request(Some("tok-ana"), UserId::new(77))
                .await,
            Err(FriendshipServiceError::TargetNotFound)
        ));

        let request = service
            .send_friend_request(Some("tok-ana"), ben)
            .await
            .unwrap();
        assert!(matches!(
            service.send_friend_request(Some("tok-ana"), ben).await,
            Err(FriendshipServiceError::RequestAlreadySent)
        ));
        assert!(matches!(
            service.send_friend_request(Some("tok-ben"), ana).await,
            Err(FriendshipServiceError::RequestAlreadyReceived)
        ));

        let inbox = repo.notifications_for_user(ben).await.unwrap();
        assert_eq!(inbox[0].kind, NotificationKind::FriendRequest);
        assert_eq!(inbox[0].related_id, Some(request.to_string()));
        assert_eq!(inbox[0].message, "Ana sent you a friend request");
    }

    #[tokio::test]
    async fn accept_makes_both_sides_friends() {
        let (repo, service, ids) = setup().await;
        let (ana, ben) = (ids[0], ids[1]);
        let request = service
            .send_friend_request(Some("tok-ana"), ben)
            .await
            .unwrap();

        assert!(matches!(
            service.accept_friend_request(Some("tok-ana"), request).await,
            Err(FriendshipServiceError::InvalidRequest)
        ));
        service
            .accept_friend_request(Some("tok-ben"), request)
            .await
            .unwrap();

        let ana_friends = service.friends(Some("tok-ana")).await.unwrap();
        let ben_friends = service.friends(Some("tok-ben")).await.unwrap();
        assert_eq!(ana_friends[0].friend.id(), ben);
        assert_eq!(ben_friends[0].friend.id(), ana);
        assert!(matches!(
            service.send_friend_request(Some("tok-ben"), ana).await,
            Err(FriendshipServiceError::AlreadyFriends)
        ));

        let inbox = repo.notifications_for_user(ana).await.unwrap();
        assert_eq!(inbox[0].message, "Ben accepted your friend request");

        service.remove_friend(Some("tok-ben"), ana).await.unwrap();
        assert!(service.friends(Some("tok-ana")).await.unwrap().is_empty());
        // Removing again is a no-op.
        service.remove_friend(Some("tok-ben"), ana).await.unwrap();
    }

    #[tokio::test]
    async fn reject_and_cancel_respect_sides() {
        let (_repo, service, ids) = setup().await;
        let ben = ids[1];
        let request = service
            .send_friend_request(Some("tok-ana"), ben)
            .await
            .unwrap();
        assert_eq!(service.sent_requests(Some("tok-ana")).await.unwrap().len(), 1);
        let pending = service.pending_requests(Some("tok-ben")).await.unwrap();
        assert_eq!(pending[0].requester.name(), "Ana");

        assert!(matches!(
            service.cancel_friend_request(Some("tok-ben"), request).await,
            Err(FriendshipServiceError::NotRequester)
        ));
        service
            .cancel_friend_request(Some("tok-ana"), request)
            .await
            .unwrap();
        assert!(matches!(
            service.reject_friend_request(Some("tok-ben"), request).await,
            Err(FriendshipServiceError::RequestNotFound)
        ));
    }

    #[tokio::test]
    async fn search_excludes_self_friends_and_pending() {
        let (_repo, service, ids) = setup().await;
        let hits = service.search_users(Some("tok-ana"), "GYM").await.unwrap();
        assert_eq!(hits.iter().map(User::name).collect::<Vec<_>>(), ["Ben"]);

        service
            .send_friend_request(Some("tok-cat"), ids[0])
            .await
            .unwrap();
        let hits = service.search_users(Some("tok-ana"), "").await.unwrap();
        assert_eq!(hits.iter().map(User::name).collect::<Vec<_>>(), ["Ben"]);
    }
}
