mod challenge;
mod ids;
mod participant;
mod progress;
mod social;
mod user;

pub use ids::{
    ChallengeId, ExerciseId, FriendRequestId, FriendshipId, NotificationId, ParseIdError,
    ParticipantId, ProgressId, UserId,
};

pub use challenge::{
    Challenge, ChallengeDraft, ChallengeError, ChallengeStatus, Exercise, ExerciseDraft,
};
pub use participant::{Participant, ParticipantError, ParticipantStatus};
pub use progress::{ProgressError, ProgressRecord, validate_completed_reps};
pub use social::{FriendRequest, Friendship, InvalidNotificationKind, Notification, NotificationKind};
pub use user::{DEFAULT_USER_NAME, Identity, User, UserError};
