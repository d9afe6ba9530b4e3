use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        token_identifier TEXT NOT NULL UNIQUE,
        email TEXT
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS challenges (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        creator_id INTEGER NOT NULL,
        date TEXT NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('active', 'completed', 'cancelled')),
        FOREIGN KEY (creator_id) REFERENCES users(id)
    );
    ",
    "CREATE INDEX IF NOT EXISTS idx_challenges_creator ON challenges(creator_id);",
    "CREATE INDEX IF NOT EXISTS idx_challenges_date ON challenges(date);",
    r"
    CREATE TABLE IF NOT EXISTS exercises (
        id INTEGER PRIMARY KEY,
        challenge_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        target_reps INTEGER NOT NULL CHECK (target_reps > 0),
        position INTEGER NOT NULL CHECK (position >= 0),
        FOREIGN KEY (challenge_id) REFERENCES challenges(id) ON DELETE CASCADE
    );
    ",
    "CREATE INDEX IF NOT EXISTS idx_exercises_challenge ON exercises(challenge_id, position);",
    r"
    CREATE TABLE IF NOT EXISTS participants (
        id INTEGER PRIMARY KEY,
        challenge_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('invited', 'active', 'completed')),
        UNIQUE (challenge_id, user_id),
        FOREIGN KEY (challenge_id) REFERENCES challenges(id) ON DELETE CASCADE,
        FOREIGN KEY (user_id) REFERENCES users(id)
    );
    ",
    "CREATE INDEX IF NOT EXISTS idx_participants_user ON participants(user_id);",
    r"
    CREATE TABLE IF NOT EXISTS progress (
        id INTEGER PRIMARY KEY,
        exercise_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        challenge_id INTEGER NOT NULL,
        completed_reps INTEGER NOT NULL CHECK (completed_reps >= 0),
        UNIQUE (exercise_id, user_id),
        FOREIGN KEY (exercise_id) REFERENCES exercises(id) ON DELETE CASCADE,
        FOREIGN KEY (challenge_id) REFERENCES challenges(id) ON DELETE CASCADE,
        FOREIGN KEY (user_id) REFERENCES users(id)
    );
    ",
    "CREATE INDEX IF NOT EXISTS idx_progress_challenge_user ON progress(challenge_id, user_id);",
    r"
    CREATE TABLE IF NOT EXISTS friend_requests (
        id INTEGER PRIMARY KEY,
        requester_id INTEGER NOT NULL,
        recipient_id INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (requester_id, recipient_id),
        CHECK (requester_id <> recipient_id),
        FOREIGN KEY (requester_id) REFERENCES users(id),
        FOREIGN KEY (recipient_id) REFERENCES users(id)
    );
    ",
    "CREATE INDEX IF NOT EXISTS idx_friend_requests_recipient ON friend_requests(recipient_id);",
    r"
    CREATE TABLE IF NOT EXISTS friendships (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL,
        friend_id INTEGER NOT NULL,
        UNIQUE (user_id, friend_id),
        CHECK (user_id <> friend_id),
        FOREIGN KEY (user_id) REFERENCES users(id),
        FOREIGN KEY (friend_id) REFERENCES users(id)
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS notifications (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL,
        message TEXT NOT NULL,
        is_read INTEGER NOT NULL DEFAULT 0 CHECK (is_read IN (0, 1)),
        created_at TEXT NOT NULL,
        kind TEXT NOT NULL CHECK (kind IN ('friend_request', 'challenge_invitation', 'info')),
        related_id TEXT,
        FOREIGN KEY (user_id) REFERENCES users(id)
    );
    ",
    "CREATE INDEX IF NOT EXISTS idx_notifications_user_read ON notifications(user_id, is_read);",
];

/// Runs versioned migrations. Version 1 creates the full schema (users,
/// challenges with exercises and participants, progress, friends, notifications).
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;
        for statement in SCHEMA_V1 {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }
        sqlx::query(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2) ON CONFLICT(version) DO NOTHING",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}
