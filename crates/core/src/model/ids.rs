use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the underlying u64 value
            #[must_use]
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<u64>().map($name::new).map_err(|_| ParseIdError {
                    kind: stringify!($name),
                })
            }
        }
    };
}

define_id!(
    /// Unique identifier for a User
    UserId
);
define_id!(
    /// Unique identifier for a Challenge
    ChallengeId
);
define_id!(
    /// Unique identifier for an Exercise
    ExerciseId
);
define_id!(
    /// Unique identifier for a challenge participant row
    ParticipantId
);
define_id!(
    /// Unique identifier for a progress record
    ProgressId
);
define_id!(
    /// Unique identifier for a pending friend request
    FriendRequestId
);
define_id!(
    /// Unique identifier for one direction of a friendship
    FriendshipId
);
define_id!(
    /// Unique identifier for a Notification
    NotificationId
);

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_id_display() {
        let id = ChallengeId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(format!("{id:?}"), "ChallengeId(42)");
    }

    #[test]
    fn test_participant_id_from_str() {
        let id: ParticipantId = "123".parse().unwrap();
        assert_eq!(id, ParticipantId::new(123));
    }

    #[test]
    fn test_id_from_str_invalid() {
        let err = "not-a-number".parse::<UserId>().unwrap_err();
        assert_eq!(err.to_string(), "failed to parse UserId from string");
    }

    #[test]
    fn test_id_serializes_transparently() {
        let json = serde_json::to_string(&ExerciseId::new(7)).unwrap();
        assert_eq!(json, "7");
    }
}
