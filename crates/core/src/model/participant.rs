use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ChallengeId, ParticipantId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParticipantError {
    #[error("this invitation has already been processed")]
    AlreadyProcessed,

    #[error("invalid participant status: {0}")]
    InvalidStatus(String),
}

/// Membership state of a user in a challenge.
///
/// `Invited -> Active` on accept; a declined invitation is deleted instead of
/// transitioning. Nothing persists `Completed`; see
/// [`crate::aggregate::UserChallengeProgress::effective_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Invited,
    Active,
    Completed,
}

impl ParticipantStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ParticipantStatus::Invited => "invited",
            ParticipantStatus::Active => "active",
            ParticipantStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipantStatus {
    type Err = ParticipantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invited" => Ok(Self::Invited),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(ParticipantError::InvalidStatus(other.to_owned())),
        }
    }
}

/// One row per (challenge, user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    id: ParticipantId,
    challenge_id: ChallengeId,
    user_id: UserId,
    status: ParticipantStatus,
}

impl Participant {
    #[must_use]
    pub fn new(
        id: ParticipantId,
        challenge_id: ChallengeId,
        user_id: UserId,
        status: ParticipantStatus,
    ) -> Self {
        Self {
            id,
            challenge_id,
            user_id,
            status,
        }
    }

    #[must_use]
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    #[must_use]
    pub fn challenge_id(&self) -> ChallengeId {
        self.challenge_id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn status(&self) -> ParticipantStatus {
        self.status
    }

    #[must_use]
    pub fn is_invited(&self) -> bool {
        self.status == ParticipantStatus::Invited
    }

    /// Fails unless the row is still a pending invitation.
    ///
    /// # Errors
    ///
    /// Returns `ParticipantError::AlreadyProcessed` for non-invited rows.
    pub fn ensure_invited(&self) -> Result<(), ParticipantError> {
        if self.is_invited() {
            Ok(())
        } else {
            Err(ParticipantError::AlreadyProcessed)
        }
    }

    /// Accepts a pending invitation.
    ///
    /// # Errors
    ///
    /// Returns `ParticipantError::AlreadyProcessed` for non-invited rows.
    pub fn accept(&mut self) -> Result<(), ParticipantError> {
        self.ensure_invited()?;
        self.status = ParticipantStatus::Active;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invited() -> Participant {
        Participant::new(
            ParticipantId::new(1),
            ChallengeId::new(1),
            UserId::new(2),
            ParticipantStatus::Invited,
        )
    }

    #[test]
    fn accept_moves_invited_to_active() {
        let mut p = invited();
        p.accept().unwrap();
        assert_eq!(p.status(), ParticipantStatus::Active);
        assert!(!p.is_invited());
    }

    #[test]
    fn accept_twice_is_rejected() {
        let mut p = invited();
        p.accept().unwrap();
        assert_eq!(p.accept().unwrap_err(), ParticipantError::AlreadyProcessed);
    }

    #[test]
    fn status_round_trips_storage_form() {
        for status in [
            ParticipantStatus::Invited,
            ParticipantStatus::Active,
            ParticipantStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<ParticipantStatus>().unwrap(), status);
        }
    }
}
