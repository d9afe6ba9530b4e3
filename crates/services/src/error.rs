//! Shared error types for the services crate.

use thiserror::Error;

use challenge_core::model::{ChallengeError, ParticipantError, ProgressError, UserError};
use challenge_core::time::TimeError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Failure to resolve the calling user from an identity token.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("user not found")]
    UserNotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `UserService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UserServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ChallengeService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChallengeServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Challenge(#[from] ChallengeError),
    #[error(transparent)]
    Participant(#[from] ParticipantError),
    #[error(transparent)]
    Time(#[from] TimeError),
    #[error("challenge not found")]
    ChallengeNotFound,
    #[error("invitation not found")]
    InvitationNotFound,
    #[error("you are not a participant in this challenge")]
    NotParticipant,
    #[error("you are not authorized to respond to this invitation")]
    NotInvitationOwner,
    #[error("only the challenge creator can delete this challenge")]
    NotCreator,
    #[error("challenge creators cannot leave; delete the challenge instead")]
    CreatorCannotLeave,
    #[error("one or more selected friends not found")]
    InviteeNotFound,
    #[error("one or more selected users are not your friends")]
    NotFriends,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService` and the progress write queue.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error("exercise not found")]
    ExerciseNotFound,
    #[error("you are not a participant in this challenge")]
    NotParticipant,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `StatsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StatsServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Time(#[from] TimeError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `FriendshipService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FriendshipServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("cannot send friend request to yourself")]
    SelfRequest,
    #[error("user not found")]
    TargetNotFound,
    #[error("friendship already exists")]
    AlreadyFriends,
    #[error("friend request already sent")]
    RequestAlreadySent,
    #[error("this user has already sent you a friend request")]
    RequestAlreadyReceived,
    #[error("friend request not found")]
    RequestNotFound,
    #[error("invalid friend request")]
    InvalidRequest,
    #[error("you can only cancel your own friend requests")]
    NotRequester,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `NotificationService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NotificationServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("notification not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid notification type")]
    InvalidKind,
    #[error("invalid friend request")]
    InvalidFriendRequest,
    #[error("you are not authorized to respond to this invitation")]
    NotInvitationOwner,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
