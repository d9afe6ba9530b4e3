use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{ChallengeId, ExerciseId, ProgressId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("completed reps cannot be negative: {0}")]
    NegativeReps(i64),

    #[error("completed reps out of range: {0}")]
    RepsOverflow(i64),
}

/// One user's logged rep count for one exercise.
///
/// At most one record exists per (exercise, user). The count may exceed the
/// exercise target; aggregation clamps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub id: ProgressId,
    pub exercise_id: ExerciseId,
    pub user_id: UserId,
    pub challenge_id: ChallengeId,
    pub completed_reps: u32,
}

/// Validates a client-supplied rep count at the write boundary.
///
/// # Errors
///
/// Returns `ProgressError::NegativeReps` for negative input and
/// `ProgressError::RepsOverflow` when the value does not fit in `u32`.
pub fn validate_completed_reps(raw: i64) -> Result<u32, ProgressError> {
    if raw < 0 {
        return Err(ProgressError::NegativeReps(raw));
    }
    u32::try_from(raw).map_err(|_| ProgressError::RepsOverflow(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_zero_and_over_completion() {
        assert_eq!(validate_completed_reps(0).unwrap(), 0);
        assert_eq!(validate_completed_reps(150).unwrap(), 150);
    }

    #[test]
    fn rejects_negative() {
        assert_eq!(
            validate_completed_reps(-1).unwrap_err(),
            ProgressError::NegativeReps(-1)
        );
    }

    #[test]
    fn rejects_overflow() {
        assert!(matches!(
            validate_completed_reps(i64::from(u32::MAX) + 1),
            Err(ProgressError::RepsOverflow(_))
        ));
    }
}
