//! Completion percentage over `(target, completed)` rep pairs.
//!
//! Over-completion is legal in storage but never counts for more than the
//! target once aggregated.

use serde::Serialize;

/// Clamps a completed count into `[0, target]`.
#[must_use]
pub fn clamp_reps(target_reps: u32, completed_reps: u32) -> u32 {
    completed_reps.min(target_reps)
}

/// `round(100 * completed / target)` with half-up rounding; 0 when `target` is 0.
#[must_use]
pub fn percentage(completed: u64, target: u64) -> u8 {
    if target == 0 {
        return 0;
    }
    let completed = u128::from(completed.min(target));
    let target = u128::from(target);
    let pct = (200 * completed + target) / (2 * target);
    u8::try_from(pct).unwrap_or(100)
}

/// Summed clamped completion for one user over a set of exercises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionTotals {
    pub total_completed: u64,
    pub total_target: u64,
    pub completion_percentage: u8,
}

impl CompletionTotals {
    /// Aggregates `(target_reps, completed_reps)` pairs.
    #[must_use]
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let (completed, target) = pairs
            .into_iter()
            .fold((0_u64, 0_u64), |(completed, target), (t, c)| {
                (
                    completed + u64::from(clamp_reps(t, c)),
                    target + u64::from(t),
                )
            });
        Self::from_sums(completed, target)
    }

    fn from_sums(total_completed: u64, total_target: u64) -> Self {
        Self {
            total_completed,
            total_target,
            completion_percentage: percentage(total_completed, total_target),
        }
    }

    /// Combines two already-clamped totals (e.g. several challenges on one day).
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self::from_sums(
            self.total_completed + other.total_completed,
            self.total_target + other.total_target,
        )
    }

    /// Every targeted rep is done. An empty target never counts as done.
    #[must_use]
    pub fn is_fully_complete(&self) -> bool {
        self.total_target > 0 && self.total_completed >= self.total_target
    }
}

/// Percentage for one user on one challenge.
#[must_use]
pub fn completion_percentage<I>(pairs: I) -> u8
where
    I: IntoIterator<Item = (u32, u32)>,
{
    CompletionTotals::from_pairs(pairs).completion_percentage
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_zero() {
        assert_eq!(completion_percentage(Vec::<(u32, u32)>::new()), 0);
    }

    #[test]
    fn over_completion_is_clamped() {
        assert_eq!(completion_percentage([(10, 15)]), 100);
        let totals = CompletionTotals::from_pairs([(10, 15), (10, 0)]);
        assert_eq!(totals.total_completed, 10);
        assert_eq!(totals.total_target, 20);
        assert_eq!(totals.completion_percentage, 50);
    }

    #[test]
    fn partial_sums_across_exercises() {
        assert_eq!(completion_percentage([(10, 5), (10, 0)]), 25);
    }

    #[test]
    fn rounds_half_up() {
        // 1/8 = 12.5%
        assert_eq!(completion_percentage([(8, 1)]), 13);
        // 1/3 = 33.33%
        assert_eq!(completion_percentage([(3, 1)]), 33);
        // 2/3 = 66.67%
        assert_eq!(completion_percentage([(3, 2)]), 67);
    }

    #[test]
    fn stays_within_bounds() {
        for target in 0..=25_u32 {
            for completed in 0..=40_u32 {
                let pct = completion_percentage([(target, completed), (3, completed / 2)]);
                assert!(pct <= 100, "target={target} completed={completed} pct={pct}");
            }
        }
    }

    #[test]
    fn merge_recomputes_percentage() {
        let a = CompletionTotals::from_pairs([(10, 10)]);
        let b = CompletionTotals::from_pairs([(30, 0)]);
        let merged = a.merge(b);
        assert_eq!(merged.total_completed, 10);
        assert_eq!(merged.total_target, 40);
        assert_eq!(merged.completion_percentage, 25);
        assert!(!merged.is_fully_complete());
    }

    #[test]
    fn fully_complete_needs_a_target() {
        assert!(!CompletionTotals::default().is_fully_complete());
        assert!(CompletionTotals::from_pairs([(5, 7)]).is_fully_complete());
    }

    #[test]
    fn is_deterministic() {
        let pairs = [(12, 7), (20, 25), (9, 0)];
        assert_eq!(
            CompletionTotals::from_pairs(pairs),
            CompletionTotals::from_pairs(pairs)
        );
    }
}
