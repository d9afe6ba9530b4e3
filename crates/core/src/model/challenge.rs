use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ChallengeId, ExerciseId, UserId};
use crate::time::CalendarDay;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChallengeError {
    #[error("challenge name cannot be empty")]
    EmptyName,

    #[error("at least one exercise is required")]
    NoExercises,

    #[error("exercise name cannot be empty")]
    EmptyExerciseName,

    #[error("target reps must be greater than 0")]
    InvalidTargetReps,

    #[error("invalid challenge status: {0}")]
    InvalidStatus(String),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Active,
    Completed,
    Cancelled,
}

impl ChallengeStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeStatus::Active => "active",
            ChallengeStatus::Completed => "completed",
            ChallengeStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChallengeStatus {
    type Err = ChallengeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ChallengeError::InvalidStatus(other.to_owned())),
        }
    }
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

/// Exercise as submitted by the creator, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseDraft {
    pub name: String,
    pub target_reps: u32,
}

impl ExerciseDraft {
    #[must_use]
    pub fn new(name: impl Into<String>, target_reps: u32) -> Self {
        Self {
            name: name.into(),
            target_reps,
        }
    }
}

/// A validated challenge submission: trimmed names, at least one exercise,
/// every target positive. Exercise order is the submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeDraft {
    name: String,
    date: CalendarDay,
    exercises: Vec<ExerciseDraft>,
}

impl ChallengeDraft {
    /// Validates and normalizes a challenge submission.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeError` when the name is blank, the exercise list is
    /// empty, or an exercise has a blank name or zero target.
    pub fn new(
        name: impl Into<String>,
        date: CalendarDay,
        exercises: Vec<ExerciseDraft>,
    ) -> Result<Self, ChallengeError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(ChallengeError::EmptyName);
        }
        if exercises.is_empty() {
            return Err(ChallengeError::NoExercises);
        }

        let exercises = exercises
            .into_iter()
            .map(|draft| {
                let name = draft.name.trim().to_owned();
                if name.is_empty() {
                    return Err(ChallengeError::EmptyExerciseName);
                }
                if draft.target_reps == 0 {
                    return Err(ChallengeError::InvalidTargetReps);
                }
                Ok(ExerciseDraft::new(name, draft.target_reps))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            date,
            exercises,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn date(&self) -> CalendarDay {
        self.date
    }

    #[must_use]
    pub fn exercises(&self) -> &[ExerciseDraft] {
        &self.exercises
    }
}

//
// ─── CHALLENGE ─────────────────────────────────────────────────────────────────
//

/// A named, dated set of target exercises shared by a creator and invitees.
///
/// The date never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    id: ChallengeId,
    name: String,
    creator_id: UserId,
    date: CalendarDay,
    status: ChallengeStatus,
}

impl Challenge {
    /// Creates a Challenge.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeError::EmptyName` if name is empty or whitespace-only.
    pub fn new(
        id: ChallengeId,
        name: impl Into<String>,
        creator_id: UserId,
        date: CalendarDay,
        status: ChallengeStatus,
    ) -> Result<Self, ChallengeError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ChallengeError::EmptyName);
        }
        Ok(Self {
            id,
            name: name.trim().to_owned(),
            creator_id,
            date,
            status,
        })
    }

    #[must_use]
    pub fn id(&self) -> ChallengeId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn creator_id(&self) -> UserId {
        self.creator_id
    }

    #[must_use]
    pub fn date(&self) -> CalendarDay {
        self.date
    }

    #[must_use]
    pub fn status(&self) -> ChallengeStatus {
        self.status
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ChallengeStatus::Active
    }

    #[must_use]
    pub fn is_created_by(&self, user_id: UserId) -> bool {
        self.creator_id == user_id
    }
}

//
// ─── EXERCISE ──────────────────────────────────────────────────────────────────
//

/// One target exercise inside a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    id: ExerciseId,
    challenge_id: ChallengeId,
    name: String,
    target_reps: u32,
    order: u32,
}

impl Exercise {
    /// Creates an Exercise.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeError::EmptyExerciseName` or
    /// `ChallengeError::InvalidTargetReps` on invalid input.
    pub fn new(
        id: ExerciseId,
        challenge_id: ChallengeId,
        name: impl Into<String>,
        target_reps: u32,
        order: u32,
    ) -> Result<Self, ChallengeError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ChallengeError::EmptyExerciseName);
        }
        if target_reps == 0 {
            return Err(ChallengeError::InvalidTargetReps);
        }
        Ok(Self {
            id,
            challenge_id,
            name: name.trim().to_owned(),
            target_reps,
            order,
        })
    }

    #[must_use]
    pub fn id(&self) -> ExerciseId {
        self.id
    }

    #[must_use]
    pub fn challenge_id(&self) -> ChallengeId {
        self.challenge_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn target_reps(&self) -> u32 {
        self.target_reps
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::day;

    #[test]
    fn draft_trims_and_keeps_order() {
        let draft = ChallengeDraft::new(
            "  Morning Pump ",
            day("2024-01-10"),
            vec![ExerciseDraft::new(" Push-ups ", 20), ExerciseDraft::new("Squats", 30)],
        )
        .unwrap();
        assert_eq!(draft.name(), "Morning Pump");
        assert_eq!(draft.exercises()[0].name, "Push-ups");
        assert_eq!(draft.exercises()[1].target_reps, 30);
    }

    #[test]
    fn draft_requires_exercises() {
        let err = ChallengeDraft::new("Leg Day", day("2024-01-10"), vec![]).unwrap_err();
        assert_eq!(err, ChallengeError::NoExercises);
    }

    #[test]
    fn draft_rejects_blank_exercise_and_zero_target() {
        let err = ChallengeDraft::new(
            "Leg Day",
            day("2024-01-10"),
            vec![ExerciseDraft::new("   ", 10)],
        )
        .unwrap_err();
        assert_eq!(err, ChallengeError::EmptyExerciseName);

        let err = ChallengeDraft::new(
            "Leg Day",
            day("2024-01-10"),
            vec![ExerciseDraft::new("Lunges", 0)],
        )
        .unwrap_err();
        assert_eq!(err, ChallengeError::InvalidTargetReps);
    }

    #[test]
    fn status_parses_storage_form() {
        assert_eq!("cancelled".parse::<ChallengeStatus>().unwrap(), ChallengeStatus::Cancelled);
        assert!("archived".parse::<ChallengeStatus>().is_err());
    }

    #[test]
    fn challenge_serializes_camel_case() {
        let challenge = Challenge::new(
            ChallengeId::new(1),
            "Core Crusher",
            UserId::new(2),
            day("2024-01-10"),
            ChallengeStatus::Active,
        )
        .unwrap();
        let json = serde_json::to_value(&challenge).unwrap();
        assert_eq!(json["creatorId"], 2);
        assert_eq!(json["date"], "2024-01-10");
        assert_eq!(json["status"], "active");
    }
}
