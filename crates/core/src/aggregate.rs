//! Per-user and per-challenge views over an in-memory snapshot.
//!
//! Every function here is a pure read over rows the data-access layer already
//! loaded. Missing progress means zero reps; nothing is ever written back.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::completion::CompletionTotals;
use crate::model::{
    Challenge, ChallengeId, Exercise, ExerciseId, Participant, ParticipantId, ParticipantStatus,
    ProgressRecord, UserId,
};
use crate::streak::{StreakSummary, compute_streak};
use crate::time::CalendarDay;

/// Days covered by [`weekly_progress`], ending today.
pub const WEEK_DAYS: u32 = 7;

/// All rows belonging to one challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeSnapshot {
    pub challenge: Challenge,
    pub exercises: Vec<Exercise>,
    pub participants: Vec<Participant>,
    pub progress: Vec<ProgressRecord>,
}

/// One exercise with the user's raw (unclamped) logged reps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseProgress {
    pub exercise_id: ExerciseId,
    pub exercise_name: String,
    pub target_reps: u32,
    pub completed_reps: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChallengeProgress {
    pub user_id: UserId,
    pub exercise_progress: Vec<ExerciseProgress>,
    #[serde(flatten)]
    pub totals: CompletionTotals,
}

impl UserChallengeProgress {
    /// Stored status, except that an active participant at 100% reads as
    /// `Completed`. Never persisted.
    #[must_use]
    pub fn effective_status(&self, stored: ParticipantStatus) -> ParticipantStatus {
        if stored == ParticipantStatus::Active && self.totals.completion_percentage == 100 {
            ParticipantStatus::Completed
        } else {
            stored
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub participant_id: ParticipantId,
    pub status: ParticipantStatus,
    #[serde(flatten)]
    pub progress: UserChallengeProgress,
}

impl LeaderboardEntry {
    #[must_use]
    pub fn total_completed(&self) -> u64 {
        self.progress.totals.total_completed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PastChallengeSummary {
    pub challenge_id: ChallengeId,
    pub name: String,
    pub date: CalendarDay,
    pub total_exercises: usize,
    pub user_completed_reps: u64,
    pub user_total_target: u64,
    pub completion_percentage: u8,
    pub participant_count: usize,
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayProgress {
    pub date: CalendarDay,
    pub challenge_count: usize,
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyProgress {
    pub days_with_challenges: Vec<DayProgress>,
    pub completed_challenges_this_week: usize,
}

impl ChallengeSnapshot {
    /// Exercises sorted by their position in the challenge.
    #[must_use]
    pub fn ordered_exercises(&self) -> Vec<&Exercise> {
        let mut exercises: Vec<&Exercise> = self.exercises.iter().collect();
        exercises.sort_by_key(|e| e.order());
        exercises
    }

    #[must_use]
    pub fn participant_for(&self, user_id: UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id() == user_id)
    }

    /// True when the user has a row in this challenge, in any status.
    #[must_use]
    pub fn includes(&self, user_id: UserId) -> bool {
        self.participant_for(user_id).is_some()
    }

    fn progress_index(&self) -> HashMap<(ExerciseId, UserId), u32> {
        self.progress
            .iter()
            .filter(|p| p.challenge_id == self.challenge.id())
            .map(|p| ((p.exercise_id, p.user_id), p.completed_reps))
            .collect()
    }

    fn progress_with_index(
        &self,
        user_id: UserId,
        exercises: &[&Exercise],
        index: &HashMap<(ExerciseId, UserId), u32>,
    ) -> UserChallengeProgress {
        let exercise_progress: Vec<ExerciseProgress> = exercises
            .iter()
            .map(|exercise| ExerciseProgress {
                exercise_id: exercise.id(),
                exercise_name: exercise.name().to_owned(),
                target_reps: exercise.target_reps(),
                completed_reps: index
                    .get(&(exercise.id(), user_id))
                    .copied()
                    .unwrap_or(0),
            })
            .collect();
        let totals = CompletionTotals::from_pairs(
            exercise_progress
                .iter()
                .map(|ep| (ep.target_reps, ep.completed_reps)),
        );
        UserChallengeProgress {
            user_id,
            exercise_progress,
            totals,
        }
    }

    /// Per-exercise breakdown and clamped totals for one user.
    #[must_use]
    pub fn user_progress(&self, user_id: UserId) -> UserChallengeProgress {
        let exercises = self.ordered_exercises();
        self.progress_with_index(user_id, &exercises, &self.progress_index())
    }

    /// Every participant's progress, most completed reps first.
    ///
    /// Ties keep participant row order.
    #[must_use]
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let exercises = self.ordered_exercises();
        let index = self.progress_index();
        let mut entries: Vec<LeaderboardEntry> = self
            .participants
            .iter()
            .map(|participant| {
                let progress =
                    self.progress_with_index(participant.user_id(), &exercises, &index);
                LeaderboardEntry {
                    participant_id: participant.id(),
                    status: progress.effective_status(participant.status()),
                    progress,
                }
            })
            .collect();
        entries.sort_by_key(|entry| Reverse(entry.total_completed()));
        entries
    }

    #[must_use]
    pub fn past_summary(&self, user_id: UserId) -> PastChallengeSummary {
        let progress = self.user_progress(user_id);
        PastChallengeSummary {
            challenge_id: self.challenge.id(),
            name: self.challenge.name().to_owned(),
            date: self.challenge.date(),
            total_exercises: self.exercises.len(),
            user_completed_reps: progress.totals.total_completed,
            user_total_target: progress.totals.total_target,
            completion_percentage: progress.totals.completion_percentage,
            participant_count: self.participants.len(),
            is_completed: progress.totals.completion_percentage == 100,
        }
    }
}

/// Active challenges dated `day`.
#[must_use]
pub fn challenges_on(snapshots: &[ChallengeSnapshot], day: CalendarDay) -> Vec<&ChallengeSnapshot> {
    snapshots
        .iter()
        .filter(|s| s.challenge.date() == day && s.challenge.is_active())
        .collect()
}

fn participating_active<'a>(
    snapshots: &'a [ChallengeSnapshot],
    user_id: UserId,
) -> impl Iterator<Item = &'a ChallengeSnapshot> {
    snapshots
        .iter()
        .filter(move |s| s.challenge.is_active() && s.includes(user_id))
}

/// Clamped totals per day, summed over every active challenge the user is in.
fn totals_by_day(
    snapshots: &[ChallengeSnapshot],
    user_id: UserId,
) -> BTreeMap<CalendarDay, (usize, CompletionTotals)> {
    let mut days: BTreeMap<CalendarDay, (usize, CompletionTotals)> = BTreeMap::new();
    for snapshot in participating_active(snapshots, user_id) {
        let totals = snapshot.user_progress(user_id).totals;
        let entry = days
            .entry(snapshot.challenge.date())
            .or_insert((0, CompletionTotals::default()));
        entry.0 += 1;
        entry.1 = entry.1.merge(totals);
    }
    days
}

/// Days on which the user reached 100% across all of that day's challenges.
#[must_use]
pub fn completed_days(snapshots: &[ChallengeSnapshot], user_id: UserId) -> BTreeSet<CalendarDay> {
    totals_by_day(snapshots, user_id)
        .into_iter()
        .filter(|(_, (_, totals))| totals.is_fully_complete())
        .map(|(day, _)| day)
        .collect()
}

#[must_use]
pub fn user_streak(
    snapshots: &[ChallengeSnapshot],
    user_id: UserId,
    today: CalendarDay,
) -> StreakSummary {
    compute_streak(&completed_days(snapshots, user_id), today)
}

/// Summaries of the user's challenges dated strictly before `today`, newest first.
#[must_use]
pub fn past_challenges(
    snapshots: &[ChallengeSnapshot],
    user_id: UserId,
    today: CalendarDay,
) -> Vec<PastChallengeSummary> {
    let mut past: Vec<PastChallengeSummary> = snapshots
        .iter()
        .filter(|s| s.challenge.date() < today && s.includes(user_id))
        .map(|s| s.past_summary(user_id))
        .collect();
    past.sort_by_key(|summary| Reverse(summary.date));
    past
}

/// Per-day status for the week ending `today`, oldest day first.
#[must_use]
pub fn weekly_progress(
    snapshots: &[ChallengeSnapshot],
    user_id: UserId,
    today: CalendarDay,
) -> WeeklyProgress {
    let by_day = totals_by_day(snapshots, user_id);
    let days: Vec<CalendarDay> = (0..WEEK_DAYS)
        .rev()
        .filter_map(|back| today.days_back(back))
        .collect();

    let days_with_challenges = days
        .iter()
        .map(|day| match by_day.get(day) {
            Some((count, totals)) => DayProgress {
                date: *day,
                challenge_count: *count,
                is_completed: totals.is_fully_complete(),
            },
            None => DayProgress {
                date: *day,
                challenge_count: 0,
                is_completed: false,
            },
        })
        .collect();

    let completed_challenges_this_week = participating_active(snapshots, user_id)
        .filter(|s| days.contains(&s.challenge.date()))
        .filter(|s| s.user_progress(user_id).totals.completion_percentage == 100)
        .count();

    WeeklyProgress {
        days_with_challenges,
        completed_challenges_this_week,
    }
}
