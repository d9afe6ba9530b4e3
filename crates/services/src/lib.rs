#![forbid(unsafe_code)]

pub mod app_services;
pub mod auth;
pub mod challenge_service;
pub mod error;
pub mod friendship_service;
pub mod notification_service;
pub mod notifier;
pub mod progress_queue;
pub mod progress_service;
pub mod snapshot;
pub mod stats_service;
pub mod user_service;

pub use challenge_core::Clock;

pub use app_services::AppServices;
pub use challenge_service::{
    ChallengeDetails, ChallengeListItem, ChallengeService, CreatedChallengeView,
    LeaderboardRow, ParticipantWithUser, PendingInvitation, TodaysChallenge,
};
pub use error::{
    AppServicesError, AuthError, ChallengeServiceError, FriendshipServiceError,
    NotificationServiceError, ProgressServiceError, StatsServiceError, UserServiceError,
};
pub use friendship_service::{FriendView, FriendshipService, IncomingRequest, SentRequest};
pub use notification_service::NotificationService;
pub use progress_queue::ProgressWriteQueue;
pub use progress_service::ProgressService;
pub use stats_service::StatsService;
pub use user_service::UserService;
