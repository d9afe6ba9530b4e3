use challenge_core::CalendarDay;
use challenge_core::model::{
    Challenge, ChallengeId, ChallengeStatus, Exercise, ExerciseId, FriendRequest,
    FriendRequestId, Friendship, FriendshipId, Notification, NotificationId, NotificationKind,
    Participant, ParticipantId, ParticipantStatus, ProgressId, ProgressRecord, User, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Unique-constraint violations become `Conflict`; everything else is a
/// connection-level failure.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

macro_rules! id_conversions {
    ($($ty:ident => $from:ident, $to:ident, $field:literal;)+) => {
        $(
            pub(crate) fn $from(v: i64) -> Result<$ty, StorageError> {
                Ok($ty::new(i64_to_u64($field, v)?))
            }

            pub(crate) fn $to(id: $ty) -> Result<i64, StorageError> {
                u64_to_i64($field, id.value())
            }
        )+
    };
}

id_conversions! {
    UserId => user_id_from_i64, user_id_to_i64, "user_id";
    ChallengeId => challenge_id_from_i64, challenge_id_to_i64, "challenge_id";
    ExerciseId => exercise_id_from_i64, exercise_id_to_i64, "exercise_id";
    ParticipantId => participant_id_from_i64, participant_id_to_i64, "participant_id";
    ProgressId => progress_id_from_i64, progress_id_to_i64, "progress_id";
    FriendRequestId => friend_request_id_from_i64, friend_request_id_to_i64, "friend_request_id";
    FriendshipId => friendship_id_from_i64, friendship_id_to_i64, "friendship_id";
    NotificationId => notification_id_from_i64, notification_id_to_i64, "notification_id";
}

fn day_from_row(row: &SqliteRow, column: &str) -> Result<CalendarDay, StorageError> {
    row.try_get::<String, _>(column)
        .map_err(ser)?
        .parse::<CalendarDay>()
        .map_err(ser)
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<User, StorageError> {
    User::new(
        user_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<String, _>("token_identifier").map_err(ser)?,
        row.try_get::<Option<String>, _>("email").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_challenge_row(row: &SqliteRow) -> Result<Challenge, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    Challenge::new(
        challenge_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        user_id_from_i64(row.try_get("creator_id").map_err(ser)?)?,
        day_from_row(row, "date")?,
        status.parse::<ChallengeStatus>().map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_exercise_row(row: &SqliteRow) -> Result<Exercise, StorageError> {
    Exercise::new(
        exercise_id_from_i64(row.try_get("id").map_err(ser)?)?,
        challenge_id_from_i64(row.try_get("challenge_id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        u32_from_i64("target_reps", row.try_get("target_reps").map_err(ser)?)?,
        u32_from_i64("position", row.try_get("position").map_err(ser)?)?,
    )
    .map_err(ser)
}

pub(crate) fn map_participant_row(row: &SqliteRow) -> Result<Participant, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    Ok(Participant::new(
        participant_id_from_i64(row.try_get("id").map_err(ser)?)?,
        challenge_id_from_i64(row.try_get("challenge_id").map_err(ser)?)?,
        user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        status.parse::<ParticipantStatus>().map_err(ser)?,
    ))
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ProgressRecord, StorageError> {
    Ok(ProgressRecord {
        id: progress_id_from_i64(row.try_get("id").map_err(ser)?)?,
        exercise_id: exercise_id_from_i64(row.try_get("exercise_id").map_err(ser)?)?,
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        challenge_id: challenge_id_from_i64(row.try_get("challenge_id").map_err(ser)?)?,
        completed_reps: u32_from_i64(
            "completed_reps",
            row.try_get("completed_reps").map_err(ser)?,
        )?,
    })
}

pub(crate) fn map_friend_request_row(row: &SqliteRow) -> Result<FriendRequest, StorageError> {
    Ok(FriendRequest {
        id: friend_request_id_from_i64(row.try_get("id").map_err(ser)?)?,
        requester_id: user_id_from_i64(row.try_get("requester_id").map_err(ser)?)?,
        recipient_id: user_id_from_i64(row.try_get("recipient_id").map_err(ser)?)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_friendship_row(row: &SqliteRow) -> Result<Friendship, StorageError> {
    Ok(Friendship {
        id: friendship_id_from_i64(row.try_get("id").map_err(ser)?)?,
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        friend_id: user_id_from_i64(row.try_get("friend_id").map_err(ser)?)?,
    })
}

pub(crate) fn map_notification_row(row: &SqliteRow) -> Result<Notification, StorageError> {
    let kind: String = row.try_get("kind").map_err(ser)?;
    Ok(Notification {
        id: notification_id_from_i64(row.try_get("id").map_err(ser)?)?,
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        message: row.try_get("message").map_err(ser)?,
        is_read: row.try_get::<i64, _>("is_read").map_err(ser)? != 0,
        created_at: row.try_get("created_at").map_err(ser)?,
        kind: kind.parse::<NotificationKind>().map_err(ser)?,
        related_id: row.try_get("related_id").map_err(ser)?,
    })
}

pub(crate) fn map_rows<T>(
    rows: &[SqliteRow],
    map: fn(&SqliteRow) -> Result<T, StorageError>,
) -> Result<Vec<T>, StorageError> {
    rows.iter().map(map).collect()
}
