//! Duration reconciliation.
//!
//! A recipe's target duration is drawn once at launch. Its fixed sub-steps
//! cost what they cost; the difference (the slack) is spread over a few
//! flexible buckets by integer weight. The last bucket takes the rounding
//! remainder so the buckets always sum to exactly the slack. A negative
//! slack produces negative buckets, which are consumed as zero-tick delays.

use crate::config::{DurationBounds, DurationSampling};
use crate::fixed::Ticks;
use crate::rng::SimRng;

/// Choose the target duration of a recipe.
///
/// With [`DurationSampling::Mean`] no random number is drawn.
pub fn sample_target(bounds: &DurationBounds, sampling: DurationSampling, rng: &mut SimRng) -> Ticks {
    match sampling {
        DurationSampling::Mean => bounds.mean,
        DurationSampling::Normal { .. } => {
            rng.truncated_normal_ticks(bounds.mean, bounds.stddev(), bounds.lower, bounds.upper)
        }
    }
}

/// `round(numerator / denominator)`, halves away from zero. `denominator > 0`.
fn div_round(numerator: i128, denominator: i128) -> i128 {
    let magnitude = (2 * numerator.abs() + denominator) / (2 * denominator);
    if numerator < 0 { -magnitude } else { magnitude }
}

/// Split `slack` over buckets with the given weights.
///
/// Every bucket but the last gets `round(slack * w_i / sum(w))`; the last
/// gets whatever remains. With no weights the slack is dropped.
pub fn split_slack(slack: i64, weights: &[u32]) -> Vec<i64> {
    let Some((_, head)) = weights.split_last() else {
        return Vec::new();
    };
    let total: i128 = weights.iter().map(|&w| i128::from(w)).sum();
    let mut buckets = Vec::with_capacity(weights.len());
    let mut assigned: i64 = 0;
    for &w in head {
        let share = if total == 0 {
            0
        } else {
            div_round(i128::from(slack) * i128::from(w), total) as i64
        };
        assigned += share;
        buckets.push(share);
    }
    buckets.push(slack - assigned);
    buckets
}

/// The reconciled timing of one recipe instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub target: Ticks,
    pub fixed_total: Ticks,
    pub slack: i64,
    pub buckets: Vec<i64>,
}

impl Reconciliation {
    pub fn new(target: Ticks, fixed_total: Ticks, weights: &[u32]) -> Self {
        let slack = target as i64 - fixed_total as i64;
        Self {
            target,
            fixed_total,
            slack,
            buckets: split_slack(slack, weights),
        }
    }

    /// Ticks the buckets actually consume once negatives are clamped.
    pub fn flexible_total(&self) -> Ticks {
        self.buckets.iter().map(|&b| b.max(0) as Ticks).sum()
    }

    /// Delay the recipe will execute in total.
    pub fn planned_total(&self) -> Ticks {
        self.fixed_total + self.flexible_total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CIP_WEIGHTS: [u32; 6] = [1, 10, 3, 20, 15, 10];

    #[test]
    fn slack_split_matches_worked_example() {
        let r = Reconciliation::new(600, 500, &CIP_WEIGHTS);
        assert_eq!(r.slack, 100);
        assert_eq!(r.buckets, vec![2, 17, 5, 34, 25, 17]);
        assert_eq!(r.buckets.iter().sum::<i64>(), 100);
        assert_eq!(r.planned_total(), 600);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(split_slack(1, &[1, 1]), vec![1, 0]);
        assert_eq!(split_slack(-1, &[1, 1]), vec![-1, 0]);
        assert_eq!(split_slack(3, &[1, 1]), vec![2, 1]);
    }

    #[test]
    fn negative_slack_clamps_when_consumed() {
        let r = Reconciliation::new(400, 500, &CIP_WEIGHTS);
        assert_eq!(r.slack, -100);
        assert_eq!(r.buckets.iter().sum::<i64>(), -100);
        assert_eq!(r.flexible_total(), 0);
        assert_eq!(r.planned_total(), 500);
    }

    #[test]
    fn single_bucket_takes_everything() {
        assert_eq!(split_slack(1234, &[7]), vec![1234]);
    }

    #[test]
    fn no_buckets_drops_slack() {
        assert!(split_slack(50, &[]).is_empty());
        let r = Reconciliation::new(50, 10, &[]);
        assert_eq!(r.planned_total(), 10);
    }

    #[test]
    fn zero_weights_push_everything_to_last() {
        assert_eq!(split_slack(10, &[0, 0, 0]), vec![0, 0, 10]);
    }

    #[test]
    fn dissolver_cip_at_mean() {
        // Fixed steps of the dissolver CIP sum to 1989 ticks; the mean is 58 min.
        let r = Reconciliation::new(3480, 1989, &CIP_WEIGHTS);
        assert_eq!(r.slack, 1491);
        assert_eq!(r.buckets.iter().sum::<i64>(), 1491);
        assert_eq!(r.planned_total(), 3480);
    }

    #[test]
    fn mean_sampling_draws_nothing() {
        let bounds = DurationBounds::new(100, 200, 300);
        let mut rng = SimRng::new(9);
        let before = rng.state();
        assert_eq!(sample_target(&bounds, DurationSampling::Mean, &mut rng), 200);
        assert_eq!(rng.state(), before);
    }

    #[test]
    fn normal_sampling_stays_in_bounds() {
        let bounds = DurationBounds::new(2880, 3480, 7080);
        let mut rng = SimRng::new(3);
        for _ in 0..500 {
            let t = sample_target(&bounds, DurationSampling::Normal { seed: 3 }, &mut rng);
            assert!((2880..=7080).contains(&t));
        }
    }
}
