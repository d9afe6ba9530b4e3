use std::fmt;

use challenge_core::CalendarDay;
use challenge_core::aggregate::{PastChallengeSummary, WeeklyProgress};
use challenge_core::model::{
    ChallengeId, ExerciseDraft, ExerciseId, Identity, ParticipantId, UserId,
};
use challenge_core::streak::StreakSummary;
use serde::Serialize;
use services::{AppServices, Clock, TodaysChallenge};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingCommand,
    UnknownCommand(String),
    MissingValue { flag: &'static str },
    MissingArgument { what: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidId { flag: &'static str, raw: String },
    InvalidDate { raw: String },
    InvalidExercise { raw: String },
    InvalidReps { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingCommand => write!(f, "missing command"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { what } => write!(f, "missing {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDate { raw } => {
                write!(f, "invalid --date value (expected YYYY-MM-DD): {raw}")
            }
            ArgsError::InvalidExercise { raw } => {
                write!(f, "invalid --exercise value (expected NAME:REPS): {raw}")
            }
            ArgsError::InvalidReps { raw } => write!(f, "invalid --reps value: {raw}"),
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

fn parse_id<T: std::str::FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.parse::<T>()
        .map_err(|_| ArgsError::InvalidId { flag, raw })
}

/// `NAME:REPS`, split on the last colon so names may contain one.
fn parse_exercise(raw: &str) -> Result<ExerciseDraft, ArgsError> {
    let invalid = || ArgsError::InvalidExercise {
        raw: raw.to_owned(),
    };
    let (name, reps) = raw.rsplit_once(':').ok_or_else(invalid)?;
    let reps = reps.trim().parse::<u32>().map_err(|_| invalid())?;
    Ok(ExerciseDraft::new(name, reps))
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  fitchallenge <command> [--db <sqlite_url>] [--token <id>] [--tz <zone>] [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  login [--name <name>] [--email <email>]  register or refresh the acting user");
    eprintln!("  whoami");
    eprintln!("  dashboard                                streak, today, past and weekly views");
    eprintln!("  challenges                               every challenge you belong to");
    eprintln!("  show <challenge_id>");
    eprintln!("  create --name <name> [--date <YYYY-MM-DD>] --exercise <NAME:REPS>... [--invite <user_id>]...");
    eprintln!("  invitations");
    eprintln!("  accept <participant_id> | decline <participant_id>");
    eprintln!("  leave <challenge_id> | delete <challenge_id>");
    eprintln!("  log --exercise-id <id> --reps <n>");
    eprintln!("  friends | search <term> | befriend <user_id>");
    eprintln!("  notifications");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://dev.sqlite3");
    eprintln!("  --tz UTC");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  FITCHALLENGE_DB_URL, FITCHALLENGE_TOKEN, FITCHALLENGE_TZ, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Login {
        name: Option<String>,
        email: Option<String>,
    },
    Whoami,
    Dashboard,
    Challenges,
    Show(ChallengeId),
    Create {
        name: String,
        date: Option<CalendarDay>,
        exercises: Vec<ExerciseDraft>,
        invite: Vec<UserId>,
    },
    Invitations,
    Accept(ParticipantId),
    Decline(ParticipantId),
    Leave(ChallengeId),
    Delete(ChallengeId),
    Log {
        exercise_id: ExerciseId,
        reps: i64,
    },
    Friends,
    Search(String),
    Befriend(UserId),
    Notifications,
}

/// Values taken from the environment before flags are applied.
#[derive(Debug, Clone, Default)]
struct EnvDefaults {
    db_url: Option<String>,
    token: Option<String>,
    timezone: Option<String>,
}

impl EnvDefaults {
    fn from_env() -> Self {
        Self {
            db_url: std::env::var("FITCHALLENGE_DB_URL").ok(),
            token: std::env::var("FITCHALLENGE_TOKEN").ok(),
            timezone: std::env::var("FITCHALLENGE_TZ").ok(),
        }
    }
}

#[derive(Debug)]
struct Args {
    db_url: String,
    token: Option<String>,
    timezone: Option<String>,
    command: Command,
}

impl Args {
    fn parse(
        mut args: impl Iterator<Item = String>,
        defaults: EnvDefaults,
    ) -> Result<Self, ArgsError> {
        let command_name = args.next().ok_or(ArgsError::MissingCommand)?;
        if matches!(command_name.as_str(), "--help" | "-h" | "help") {
            print_usage();
            std::process::exit(0);
        }

        let mut db_url = defaults
            .db_url
            .map_or_else(|| "sqlite://dev.sqlite3".into(), normalize_sqlite_url);
        let mut token = defaults.token;
        let mut timezone = defaults.timezone;

        let mut name = None;
        let mut email = None;
        let mut date = None;
        let mut exercises = Vec::new();
        let mut invite = Vec::new();
        let mut exercise_id = None;
        let mut reps = None;
        let mut positional = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--token" => token = Some(require_value(&mut args, "--token")?),
                "--tz" => timezone = Some(require_value(&mut args, "--tz")?),
                "--name" => name = Some(require_value(&mut args, "--name")?),
                "--email" => email = Some(require_value(&mut args, "--email")?),
                "--date" => {
                    let value = require_value(&mut args, "--date")?;
                    date = Some(
                        value
                            .parse::<CalendarDay>()
                            .map_err(|_| ArgsError::InvalidDate { raw: value.clone() })?,
                    );
                }
                "--exercise" => {
                    exercises.push(parse_exercise(&require_value(&mut args, "--exercise")?)?);
                }
                "--invite" => {
                    let value = require_value(&mut args, "--invite")?;
                    invite.push(parse_id::<UserId>("--invite", value)?);
                }
                "--exercise-id" => {
                    exercise_id = Some(parse_id::<ExerciseId>(
                        "--exercise-id",
                        require_value(&mut args, "--exercise-id")?,
                    )?);
                }
                "--reps" => {
                    let value = require_value(&mut args, "--reps")?;
                    reps = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| ArgsError::InvalidReps { raw: value.clone() })?,
                    );
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let mut operand = |what: &'static str| {
            positional
                .next()
                .ok_or(ArgsError::MissingArgument { what })
        };

        let command = match command_name.as_str() {
            "login" => Command::Login { name, email },
            "whoami" => Command::Whoami,
            "dashboard" => Command::Dashboard,
            "challenges" => Command::Challenges,
            "show" => Command::Show(parse_id("challenge id", operand("challenge id")?)?),
            "create" => Command::Create {
                name: name.ok_or(ArgsError::MissingValue { flag: "--name" })?,
                date,
                exercises,
                invite,
            },
            "invitations" => Command::Invitations,
            "accept" => Command::Accept(parse_id("participant id", operand("participant id")?)?),
            "decline" => {
                Command::Decline(parse_id("participant id", operand("participant id")?)?)
            }
            "leave" => Command::Leave(parse_id("challenge id", operand("challenge id")?)?),
            "delete" => Command::Delete(parse_id("challenge id", operand("challenge id")?)?),
            "log" => Command::Log {
                exercise_id: exercise_id.ok_or(ArgsError::MissingValue {
                    flag: "--exercise-id",
                })?,
                reps: reps.ok_or(ArgsError::MissingValue { flag: "--reps" })?,
            },
            "friends" => Command::Friends,
            "search" => Command::Search(operand("search term")?),
            "befriend" => Command::Befriend(parse_id("user id", operand("user id")?)?),
            "notifications" => Command::Notifications,
            _ => return Err(ArgsError::UnknownCommand(command_name)),
        };
        if let Some(extra) = positional.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Self {
            db_url,
            token,
            timezone,
            command,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

/// Everything the home screen shows in one document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Dashboard {
    streak: StreakSummary,
    todays_challenges: Option<Vec<TodaysChallenge>>,
    past_challenges: Vec<PastChallengeSummary>,
    weekly_progress: WeeklyProgress,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn execute(app: &AppServices, args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let token = args.token.as_deref();
    let tz = args.timezone.as_deref();

    match args.command {
        Command::Login { name, email } => {
            let token = token.ok_or(ArgsError::MissingValue { flag: "--token" })?;
            let mut identity = Identity::new(token);
            if let Some(name) = name {
                identity = identity.with_name(name);
            }
            if let Some(email) = email {
                identity = identity.with_email(email);
            }
            let id = app.users().store(&identity).await?;
            print_json(&serde_json::json!({ "userId": id }))
        }
        Command::Whoami => print_json(&app.users().current_user_info(token).await?),
        Command::Dashboard => {
            let stats = app.stats();
            let challenges = app.challenges();
            let dashboard = Dashboard {
                streak: stats.user_streak(token, tz).await?,
                todays_challenges: challenges.todays_challenges(token, tz).await?,
                past_challenges: challenges.past_challenges(token, tz).await?,
                weekly_progress: stats.weekly_progress(token, tz).await?,
            };
            print_json(&dashboard)
        }
        Command::Challenges => print_json(&app.challenges().user_challenges(token).await?),
        Command::Show(id) => print_json(&app.challenges().challenge_details(token, id).await?),
        Command::Create {
            name,
            date,
            exercises,
            invite,
        } => {
            let date = match date {
                Some(date) => date,
                None => Clock::default_clock().today_in(tz)?,
            };
            let created = app
                .challenges()
                .create_challenge(token, &name, date, exercises, &invite)
                .await?;
            print_json(&created)
        }
        Command::Invitations => print_json(&app.challenges().pending_invitations(token).await?),
        Command::Accept(id) => {
            app.challenges().accept_invitation(token, id).await?;
            Ok(())
        }
        Command::Decline(id) => {
            app.challenges().decline_invitation(token, id).await?;
            Ok(())
        }
        Command::Leave(id) => {
            app.challenges().leave_challenge(token, id).await?;
            Ok(())
        }
        Command::Delete(id) => {
            app.challenges().delete_challenge(token, id).await?;
            Ok(())
        }
        Command::Log { exercise_id, reps } => {
            let id = app
                .progress()
                .update_exercise_progress(token, exercise_id, reps)
                .await?;
            print_json(&serde_json::json!({ "progressId": id }))
        }
        Command::Friends => print_json(&app.friendships().friends(token).await?),
        Command::Search(term) => print_json(&app.friendships().search_users(token, &term).await?),
        Command::Befriend(user_id) => {
            let id = app
                .friendships()
                .send_friend_request(token, user_id)
                .await?;
            print_json(&serde_json::json!({ "requestId": id }))
        }
        Command::Notifications => print_json(&app.notifications().notifications(token).await?),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1), EnvDefaults::from_env()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite in the binary glue so services stay storage-agnostic.
    prepare_sqlite_file(&args.db_url)?;
    let app = AppServices::new_sqlite(&args.db_url, Clock::default_clock()).await?;
    tracing::debug!(db = %args.db_url, command = ?args.command, "running command");

    execute(&app, args).await
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries the JSON.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
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

    fn parse(argv: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(
            argv.iter().map(|s| (*s).to_owned()),
            EnvDefaults::default(),
        )
    }

    #[test]
    fn create_collects_repeated_flags() {
        let args = parse(&[
            "create",
            "--name",
            "Leg Day",
            "--date",
            "2024-01-10",
            "--exercise",
            "Squats:30",
            "--exercise",
            "Plank (seconds):45",
            "--invite",
            "7",
            "--token",
            "tok",
        ])
        .unwrap();
        assert_eq!(args.token.as_deref(), Some("tok"));
        let Command::Create {
            name,
            date,
            exercises,
            invite,
        } = args.command
        else {
            panic!("expected create");
        };
        assert_eq!(name, "Leg Day");
        assert_eq!(date, Some("2024-01-10".parse().unwrap()));
        assert_eq!(exercises[1].name, "Plank (seconds)");
        assert_eq!(exercises[1].target_reps, 45);
        assert_eq!(invite, [UserId::new(7)]);
    }

    #[test]
    fn env_defaults_apply_until_overridden() {
        let defaults = EnvDefaults {
            db_url: Some("sqlite://from-env.sqlite3".into()),
            token: Some("env-token".into()),
            timezone: Some("Europe/Berlin".into()),
        };
        let args = Args::parse(
            ["dashboard", "--tz", "Asia/Tokyo"]
                .into_iter()
                .map(str::to_owned),
            defaults,
        )
        .unwrap();
        assert_eq!(args.db_url, "sqlite://from-env.sqlite3");
        assert_eq!(args.token.as_deref(), Some("env-token"));
        assert_eq!(args.timezone.as_deref(), Some("Asia/Tokyo"));
        assert_eq!(args.command, Command::Dashboard);
    }

    #[test]
    fn positional_ids_and_errors() {
        assert_eq!(
            parse(&["accept", "12"]).unwrap().command,
            Command::Accept(ParticipantId::new(12))
        );
        assert!(matches!(
            parse(&["accept"]),
            Err(ArgsError::MissingArgument { .. })
        ));
        assert!(matches!(
            parse(&["accept", "twelve"]),
            Err(ArgsError::InvalidId { .. })
        ));
        assert!(matches!(
            parse(&["log", "--exercise-id", "3"]),
            Err(ArgsError::MissingValue { flag: "--reps" })
        ));
        assert!(matches!(
            parse(&["create", "--exercise", "Squats"]),
            Err(ArgsError::InvalidExercise { .. })
        ));
        assert!(matches!(parse(&["dance"]), Err(ArgsError::UnknownCommand(_))));
        assert!(matches!(
            parse(&["whoami", "--verbose"]),
            Err(ArgsError::UnknownArg(_))
        ));
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/fit.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/fit.sqlite3"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
