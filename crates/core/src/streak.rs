//! Consecutive-day streaks over a set of fully completed calendar days.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::time::CalendarDay;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakSummary {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_completed_date: Option<CalendarDay>,
}

/// Computes current and longest streaks.
///
/// The current streak walks backward from `today`. An incomplete `today` does
/// not break it (the count simply starts at yesterday); the first incomplete
/// day before `today` ends the walk.
#[must_use]
pub fn compute_streak(completed: &BTreeSet<CalendarDay>, today: CalendarDay) -> StreakSummary {
    StreakSummary {
        current_streak: current_streak(completed, today),
        longest_streak: longest_streak(completed),
        last_completed_date: completed.last().copied(),
    }
}

fn current_streak(completed: &BTreeSet<CalendarDay>, today: CalendarDay) -> u32 {
    let mut streak = 0;
    let mut cursor = Some(today);
    let mut offset = 0_u32;

    while let Some(day) = cursor {
        if completed.contains(&day) {
            streak += 1;
        } else if offset > 0 {
            break;
        }
        offset += 1;
        cursor = day.previous();
    }
    streak
}

fn longest_streak(completed: &BTreeSet<CalendarDay>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut prev: Option<CalendarDay> = None;

    for day in completed {
        run = match prev {
            Some(p) if day.days_since(p) == 1 => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(*day);
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::day;

    fn set(days: &[&str]) -> BTreeSet<CalendarDay> {
        days.iter().map(|d| day(d)).collect()
    }

    #[test]
    fn three_consecutive_days_ending_today() {
        let s = compute_streak(
            &set(&["2024-01-10", "2024-01-09", "2024-01-08"]),
            day("2024-01-10"),
        );
        assert_eq!(s.current_streak, 3);
        assert_eq!(s.longest_streak, 3);
        assert_eq!(s.last_completed_date, Some(day("2024-01-10")));
    }

    #[test]
    fn gap_breaks_backward_walk() {
        let s = compute_streak(&set(&["2024-01-10", "2024-01-08"]), day("2024-01-10"));
        assert_eq!(s.current_streak, 1);
        assert_eq!(s.longest_streak, 1);
    }

    #[test]
    fn incomplete_today_counts_from_yesterday() {
        let s = compute_streak(&set(&["2024-01-09"]), day("2024-01-10"));
        assert_eq!(s.current_streak, 1);
        assert_eq!(s.last_completed_date, Some(day("2024-01-09")));
    }

    #[test]
    fn two_missing_days_end_the_streak() {
        let s = compute_streak(&set(&["2024-01-07", "2024-01-06"]), day("2024-01-10"));
        assert_eq!(s.current_streak, 0);
        assert_eq!(s.longest_streak, 2);
    }

    #[test]
    fn empty_set_is_zero() {
        let s = compute_streak(&BTreeSet::new(), day("2024-01-10"));
        assert_eq!(s, StreakSummary::default());
    }

    #[test]
    fn longest_is_independent_of_today() {
        let s = compute_streak(
            &set(&[
                "2023-12-30",
                "2023-12-31",
                "2024-01-01",
                "2024-01-02",
                "2024-01-09",
            ]),
            day("2024-01-10"),
        );
        assert_eq!(s.current_streak, 1);
        assert_eq!(s.longest_streak, 4);
    }

    #[test]
    fn streak_spans_dst_change() {
        let s = compute_streak(
            &set(&["2024-03-09", "2024-03-10", "2024-03-11"]),
            day("2024-03-11"),
        );
        assert_eq!(s.current_streak, 3);
        assert_eq!(s.longest_streak, 3);
    }

    #[test]
    fn recomputation_is_identical() {
        let completed = set(&["2024-01-10", "2024-01-09"]);
        let today = day("2024-01-10");
        assert_eq!(compute_streak(&completed, today), compute_streak(&completed, today));
    }
}
