use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{FriendRequestId, FriendshipId, NotificationId, UserId};

//
// ─── FRIENDS ───────────────────────────────────────────────────────────────────
//

/// A pending request from `requester_id` to `recipient_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    pub id: FriendRequestId,
    pub requester_id: UserId,
    pub recipient_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// One direction of an accepted friendship. Accepted friendships are always
/// stored as a symmetric pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Friendship {
    pub id: FriendshipId,
    pub user_id: UserId,
    pub friend_id: UserId,
}

//
// ─── NOTIFICATIONS ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid notification kind: {0}")]
pub struct InvalidNotificationKind(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FriendRequest,
    ChallengeInvitation,
    Info,
}

impl NotificationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::FriendRequest => "friend_request",
            NotificationKind::ChallengeInvitation => "challenge_invitation",
            NotificationKind::Info => "info",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = InvalidNotificationKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "friend_request" => Ok(Self::FriendRequest),
            "challenge_invitation" => Ok(Self::ChallengeInvitation),
            "info" => Ok(Self::Info),
            other => Err(InvalidNotificationKind(other.to_owned())),
        }
    }
}

/// A message delivered to one user.
///
/// `related_id` carries the id of the row an actionable notification points
/// at: the friend request for `FriendRequest`, the participant row for
/// `ChallengeInvitation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    #[serde(skip)]
    pub user_id: UserId,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_storage_form() {
        for kind in [
            NotificationKind::FriendRequest,
            NotificationKind::ChallengeInvitation,
            NotificationKind::Info,
        ] {
            assert_eq!(kind.as_str().parse::<NotificationKind>().unwrap(), kind);
        }
        assert!("promo".parse::<NotificationKind>().is_err());
    }

    #[test]
    fn notification_serializes_kind_as_type() {
        let n = Notification {
            id: NotificationId::new(3),
            user_id: UserId::new(1),
            message: "hi".into(),
            is_read: false,
            created_at: crate::time::fixed_now(),
            kind: NotificationKind::ChallengeInvitation,
            related_id: Some("9".into()),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "challenge_invitation");
        assert_eq!(json["relatedId"], "9");
        assert!(json.get("userId").is_none());
    }
}
