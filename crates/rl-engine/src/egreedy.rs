//! Epsilon-Greedy: explore uniformly with probability epsilon, otherwise
//! exploit the action with the highest mean reward.

use bandit_core::{BanditError, BanditResult, EpsilonGreedyArm};
use rand::Rng;

/// Pick an action index. Ties in the greedy branch go to the earliest action.
pub fn select<R: Rng + ?Sized>(
    arms: &[EpsilonGreedyArm],
    epsilon: f64,
    rng: &mut R,
) -> BanditResult<usize> {
    if arms.is_empty() {
        return Err(BanditError::InvalidConfig("model has no actions".into()));
    }

    if rng.gen::<f64>() < epsilon {
        return Ok(rng.gen_range(0..arms.len()));
    }

    Ok(best_mean(arms))
}

fn best_mean(arms: &[EpsilonGreedyArm]) -> usize {
    let mut best_index = 0;
    let mut best_mean = f64::NEG_INFINITY;

    for (i, arm) in arms.iter().enumerate() {
        let mean = arm.mean();
        if mean > best_mean {
            best_mean = mean;
            best_index = i;
        }
    }

    best_index
}

/// Return new statistics with one more pull of `index` carrying `reward`.
pub fn update(
    arms: &[EpsilonGreedyArm],
    index: usize,
    reward: f64,
) -> BanditResult<Vec<EpsilonGreedyArm>> {
    if !reward.is_finite() {
        return Err(BanditError::InvalidReward(reward));
    }

    let mut next = arms.to_vec();
    let arm = next
        .get_mut(index)
        .ok_or_else(|| BanditError::UnknownAction(format!("#{index}")))?;
    arm.count += 1;
    arm.reward_sum += reward;
    // A finite reward can still overflow the running sum.
    if !arm.reward_sum.is_finite() {
        return Err(BanditError::InvalidReward(reward));
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn arm(count: u64, reward_sum: f64) -> EpsilonGreedyArm {
        EpsilonGreedyArm { count, reward_sum }
    }

    #[test]
    fn test_zero_epsilon_picks_best_mean() {
        let mut rng = StdRng::seed_from_u64(1);
        let arms = vec![arm(10, 2.0), arm(4, 3.0), arm(0, 0.0)];
        for _ in 0..200 {
            assert_eq!(select(&arms, 0.0, &mut rng).unwrap(), 1);
        }
    }

    #[test]
    fn test_zero_epsilon_tie_goes_to_first() {
        let mut rng = StdRng::seed_from_u64(2);
        let arms = vec![arm(0, 0.0), arm(0, 0.0), arm(0, 0.0)];
        assert_eq!(select(&arms, 0.0, &mut rng).unwrap(), 0);

        let arms = vec![arm(1, 0.0), arm(2, 1.0), arm(4, 2.0)];
        assert_eq!(select(&arms, 0.0, &mut rng).unwrap(), 1);
    }

    #[test]
    fn test_negative_means_still_ranked() {
        let mut rng = StdRng::seed_from_u64(3);
        let arms = vec![arm(2, -4.0), arm(2, -1.0)];
        assert_eq!(select(&arms, 0.0, &mut rng).unwrap(), 1);
    }

    #[test]
    fn test_full_epsilon_is_uniform() {
        let mut rng = StdRng::seed_from_u64(4);
        // A dominant arm must not bias pure exploration.
        let arms = vec![arm(100, 100.0), arm(1, 0.0), arm(1, 0.0), arm(1, 0.0)];
        let trials = 40_000;
        let mut hits = [0usize; 4];
        for _ in 0..trials {
            hits[select(&arms, 1.0, &mut rng).unwrap()] += 1;
        }
        let expected = trials as f64 / 4.0;
        let chi_sq: f64 = hits
            .iter()
            .map(|&h| (h as f64 - expected).powi(2) / expected)
            .sum();
        // 3 degrees of freedom, p = 0.001 critical value.
        assert!(chi_sq < 16.27, "chi-square {chi_sq} with hits {hits:?}");
    }

    #[test]
    fn test_empty_arms_rejected() {
        let mut rng = StdRng::seed_from_u64(5);
        assert!(matches!(
            select(&[], 0.5, &mut rng),
            Err(BanditError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_update_touches_only_chosen_arm() {
        let arms = vec![arm(3, 1.5), arm(7, -2.0), arm(0, 0.0)];
        let next = update(&arms, 1, 0.25).unwrap();
        assert_eq!(next[1].count, 8);
        assert_eq!(next[1].reward_sum, -1.75);
        assert_eq!(next[0], arms[0]);
        assert_eq!(next[2], arms[2]);
        // Input left untouched.
        assert_eq!(arms[1].count, 7);
    }

    #[test]
    fn test_update_rejects_non_finite_reward() {
        let arms = vec![arm(0, 0.0)];
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                update(&arms, 0, bad),
                Err(BanditError::InvalidReward(_))
            ));
        }
    }

    #[test]
    fn test_update_rejects_overflowing_sum() {
        let arms = vec![arm(1, 1e308)];
        assert_eq!(
            update(&arms, 0, 1e308),
            Err(BanditError::InvalidReward(1e308))
        );
        let arms = vec![arm(1, -1e308)];
        assert!(matches!(
            update(&arms, 0, -1e308),
            Err(BanditError::InvalidReward(_))
        ));
    }

    #[test]
    fn test_update_out_of_range() {
        let arms = vec![arm(0, 0.0)];
        assert!(matches!(
            update(&arms, 3, 1.0),
            Err(BanditError::UnknownAction(_))
        ));
    }
}
