use std::fmt;

use challenge_core::model::{ChallengeStatus, ExerciseDraft, ParticipantStatus, UserId};
use challenge_core::{CalendarDay, Clock};
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use storage::repository::{NewChallengeRecord, Storage};
use tracing_subscriber::EnvFilter;

const CHALLENGE_NAMES: &[&str] = &[
    "Morning Pump",
    "Lunch Grind",
    "Evening Burn",
    "Full Body Blast",
    "Core Crusher",
    "Upper Body Focus",
    "Leg Day",
    "Cardio Mix",
    "Strength Session",
    "Quick HIIT",
];

/// Exercise name with an inclusive rep range.
const EXERCISE_POOL: &[(&str, u32, u32)] = &[
    ("Push-ups", 20, 50),
    ("Squats", 30, 60),
    ("Lunges", 20, 40),
    ("Burpees", 10, 25),
    ("Plank (seconds)", 30, 60),
    ("Crunches", 30, 50),
    ("Mountain Climbers", 20, 40),
    ("Jumping Jacks", 40, 80),
    ("Tricep Dips", 15, 30),
    ("Pull-ups", 5, 15),
];

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    days: u32,
    today: Option<CalendarDay>,
    rng_seed: Option<u64>,
    clear: bool,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidDays { raw: String },
    InvalidToday { raw: String },
    InvalidSeed { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidDays { raw } => write!(f, "invalid --days value: {raw}"),
            ArgsError::InvalidToday { raw } => {
                write!(f, "invalid --today value (expected YYYY-MM-DD): {raw}")
            }
            ArgsError::InvalidSeed { raw } => write!(f, "invalid --rng-seed value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("FITCHALLENGE_DB_URL")
            .unwrap_or_else(|_| "sqlite://dev.sqlite3".into());
        let mut days = 30;
        let mut today = None;
        let mut rng_seed = None;
        let mut clear = false;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--days" => {
                    let value = require_value(&mut args, "--days")?;
                    days = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidDays { raw: value.clone() })?;
                }
                "--today" => {
                    let value = require_value(&mut args, "--today")?;
                    today = Some(
                        value
                            .parse::<CalendarDay>()
                            .map_err(|_| ArgsError::InvalidToday { raw: value.clone() })?,
                    );
                }
                "--rng-seed" => {
                    let value = require_value(&mut args, "--rng-seed")?;
                    rng_seed = Some(
                        value
                            .parse::<u64>()
                            .map_err(|_| ArgsError::InvalidSeed { raw: value.clone() })?,
                    );
                }
                "--clear" => clear = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            days,
            today,
            rng_seed,
            clear,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>    SQLite URL (default: sqlite://dev.sqlite3)");
    eprintln!("  --days <n>           Days of history to generate, ending yesterday (default: 30)");
    eprintln!("  --today <YYYY-MM-DD> Reference day (default: today in UTC)");
    eprintln!("  --rng-seed <n>       Seed for reproducible data");
    eprintln!("  --clear              Delete all challenge data instead of seeding");
    eprintln!("  -h, --help           Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  FITCHALLENGE_DB_URL, RUST_LOG");
}

/// One generated challenge before it is written.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedChallenge {
    record: NewChallengeRecord,
    /// Completed reps per participant, aligned with `record.exercises`.
    reps: Vec<(UserId, Vec<u32>)>,
}

#[derive(Debug, Default, Clone, Copy)]
struct SeedStats {
    challenges: u64,
    exercises: u64,
    participants: u64,
    progress: u64,
}

/// 60% full, 25% partial (50-90%), 15% minimal (0-30%).
fn completion_rate(rng: &mut impl Rng) -> f64 {
    let roll: f64 = rng.random();
    if roll < 0.6 {
        1.0
    } else if roll < 0.85 {
        0.5 + rng.random::<f64>() * 0.4
    } else {
        rng.random::<f64>() * 0.3
    }
}

/// Applies the rate with a +/-5% wobble, clamped to `[0, target]`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn completed_for(target: u32, rate: f64, rng: &mut impl Rng) -> u32 {
    let base = (f64::from(target) * rate).floor();
    let variation = (base * (rng.random::<f64>() * 0.1 - 0.05)).floor();
    let reps = (base + variation).clamp(0.0, f64::from(target));
    reps as u32
}

fn plan_day(
    rng: &mut impl Rng,
    date: CalendarDay,
    days_ago: u32,
    users: &[UserId],
) -> Option<PlannedChallenge> {
    let chance = if date.is_weekend() { 0.5 } else { 0.8 };
    if users.is_empty() || rng.random::<f64>() >= chance {
        return None;
    }

    let creator = users[days_ago as usize % users.len()];
    let name = CHALLENGE_NAMES.choose(rng).copied().unwrap_or("Workout");

    let mut pool = EXERCISE_POOL.to_vec();
    pool.shuffle(rng);
    let count = rng.random_range(2..=4);
    let exercises: Vec<ExerciseDraft> = pool
        .into_iter()
        .take(count)
        .map(|(name, min, max)| ExerciseDraft::new(name, rng.random_range(min..=max)))
        .collect();

    let reps = users
        .iter()
        .map(|user| {
            let rate = completion_rate(rng);
            let per_exercise = exercises
                .iter()
                .map(|e| completed_for(e.target_reps, rate, rng))
                .collect();
            (*user, per_exercise)
        })
        .collect();

    Some(PlannedChallenge {
        record: NewChallengeRecord {
            name: name.to_owned(),
            creator_id: creator,
            date,
            status: ChallengeStatus::Active,
            exercises,
            participants: users
                .iter()
                .map(|user| (*user, ParticipantStatus::Active))
                .collect(),
        },
        reps,
    })
}

async fn seed(
    storage: &Storage,
    rng: &mut impl Rng,
    today: CalendarDay,
    days: u32,
) -> Result<SeedStats, Box<dyn std::error::Error>> {
    let users: Vec<UserId> = storage
        .users
        .list_users()
        .await?
        .iter()
        .map(challenge_core::model::User::id)
        .collect();
    if users.is_empty() {
        return Err("no users found; sign in at least once before seeding".into());
    }

    let mut stats = SeedStats::default();
    for days_ago in 1..=days {
        let Some(date) = today.days_back(days_ago) else {
            break;
        };
        let Some(plan) = plan_day(rng, date, days_ago, &users) else {
            continue;
        };

        let created = storage.challenges.insert_challenge(plan.record).await?;
        stats.challenges += 1;
        stats.exercises += created.exercise_ids.len() as u64;
        stats.participants += created.participant_ids.len() as u64;

        for (user, reps) in plan.reps {
            for (exercise_id, completed) in created.exercise_ids.iter().zip(reps) {
                if completed == 0 {
                    continue;
                }
                storage
                    .progress
                    .upsert_progress(*exercise_id, user, created.challenge_id, completed)
                    .await?;
                stats.progress += 1;
            }
        }
    }
    Ok(stats)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;

    if args.clear {
        let cleared = storage.challenges.clear_all_challenges().await?;
        tracing::info!(
            challenges = cleared.challenges,
            exercises = cleared.exercises,
            participants = cleared.participants,
            progress = cleared.progress,
            "cleared challenge data"
        );
        return Ok(());
    }

    let today = match args.today {
        Some(day) => day,
        None => Clock::default_clock().today_in(None)?,
    };
    let mut rng = match args.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let stats = seed(&storage, &mut rng, today, args.days).await?;
    tracing::info!(
        challenges = stats.challenges,
        exercises = stats.exercises,
        participants = stats.participants,
        progress = stats.progress,
        %today,
        "seeded historical data"
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use challenge_core::time::day;
    use storage::repository::NewUserRecord;

    #[test]
    fn completed_reps_stay_within_target() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let rate = completion_rate(&mut rng);
            assert!((0.0..=1.0).contains(&rate));
            let reps = completed_for(40, rate, &mut rng);
            assert!(reps <= 40);
        }
    }

    #[test]
    fn planned_challenge_uses_pool_and_rotates_creator() {
        let users = [UserId::new(1), UserId::new(2), UserId::new(3)];
        let mut rng = StdRng::seed_from_u64(42);
        let mut planned = 0;
        for days_ago in 1..=60 {
            let date = day("2024-03-01").days_back(days_ago).unwrap();
            let Some(plan) = plan_day(&mut rng, date, days_ago, &users) else {
                continue;
            };
            planned += 1;
            assert_eq!(plan.record.creator_id, users[days_ago as usize % 3]);
            assert!((2..=4).contains(&plan.record.exercises.len()));
            for exercise in &plan.record.exercises {
                let (_, min, max) = EXERCISE_POOL
                    .iter()
                    .find(|(name, _, _)| *name == exercise.name)
                    .unwrap();
                assert!((*min..=*max).contains(&exercise.target_reps));
            }
            assert_eq!(plan.reps.len(), users.len());
        }
        assert!(planned > 0);
    }

    #[tokio::test]
    async fn seeding_requires_users() {
        let storage = Storage::in_memory();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(seed(&storage, &mut rng, day("2024-03-01"), 5).await.is_err());
    }

    #[tokio::test]
    async fn seeding_writes_history_before_today() {
        let storage = Storage::in_memory();
        let user = storage
            .users
            .insert_user(NewUserRecord {
                name: "Ana".into(),
                token_identifier: "tok".into(),
                email: None,
            })
            .await
            .unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let stats = seed(&storage, &mut rng, day("2024-03-01"), 30).await.unwrap();
        assert!(stats.challenges > 0);
        assert_eq!(stats.participants, stats.challenges);

        let rows = storage
            .participants
            .participations_for_user(user)
            .await
            .unwrap();
        for row in rows {
            let challenge = storage
                .challenges
                .get_challenge(row.challenge_id())
                .await
                .unwrap()
                .unwrap();
            assert!(challenge.date() < day("2024-03-01"));
            assert_eq!(row.status(), ParticipantStatus::Active);
        }
    }
}
