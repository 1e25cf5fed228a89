//! Dispatch from a stored model to the algorithm that owns its statistics.

use crate::{egreedy, linucb};
use bandit_core::{AlgorithmConfig, BanditError, BanditResult, ModelState, ModelStatistics};
use rand::Rng;
use serde::Serialize;

/// Index of the chosen action within `state.actions`.
pub fn select<R: Rng + ?Sized>(
    state: &ModelState,
    context: Option<&[f64]>,
    rng: &mut R,
) -> BanditResult<usize> {
    match (&state.config, &state.statistics) {
        (AlgorithmConfig::EpsilonGreedy { epsilon }, ModelStatistics::EpsilonGreedy(arms)) => {
            egreedy::select(arms, *epsilon, rng)
        }
        (AlgorithmConfig::LinUcb { n_features, alpha }, ModelStatistics::LinUcb(arms)) => {
            linucb::select(arms, *n_features, *alpha, context.unwrap_or(&[]))
        }
        _ => Err(kind_mismatch(state)),
    }
}

/// New statistics after observing `reward` for `action`. `state` is untouched.
pub fn update(
    state: &ModelState,
    action: &str,
    reward: f64,
    context: Option<&[f64]>,
) -> BanditResult<ModelStatistics> {
    let index = state
        .action_index(action)
        .ok_or_else(|| BanditError::UnknownAction(action.to_string()))?;

    match (&state.config, &state.statistics) {
        (AlgorithmConfig::EpsilonGreedy { .. }, ModelStatistics::EpsilonGreedy(arms)) => {
            egreedy::update(arms, index, reward).map(ModelStatistics::EpsilonGreedy)
        }
        (AlgorithmConfig::LinUcb { n_features, .. }, ModelStatistics::LinUcb(arms)) => {
            linucb::update(arms, *n_features, index, context.unwrap_or(&[]), reward)
                .map(ModelStatistics::LinUcb)
        }
        _ => Err(kind_mismatch(state)),
    }
}

/// Read-only view of what a model has learned about one action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionInsight {
    EpsilonGreedy {
        action: String,
        count: u64,
        reward_sum: f64,
        mean: f64,
    },
    LinUcb {
        action: String,
        theta: Vec<f64>,
    },
}

pub fn inspect(state: &ModelState) -> BanditResult<Vec<ActionInsight>> {
    match (&state.config, &state.statistics) {
        (AlgorithmConfig::EpsilonGreedy { .. }, ModelStatistics::EpsilonGreedy(arms)) => Ok(state
            .actions
            .iter()
            .zip(arms)
            .map(|(action, arm)| ActionInsight::EpsilonGreedy {
                action: action.clone(),
                count: arm.count,
                reward_sum: arm.reward_sum,
                mean: arm.mean(),
            })
            .collect()),
        (AlgorithmConfig::LinUcb { n_features, .. }, ModelStatistics::LinUcb(arms)) => state
            .actions
            .iter()
            .zip(arms)
            .enumerate()
            .map(|(i, (action, arm))| {
                Ok(ActionInsight::LinUcb {
                    action: action.clone(),
                    theta: linucb::theta(arm, *n_features, i)?.to_vec(),
                })
            })
            .collect(),
        _ => Err(kind_mismatch(state)),
    }
}

fn kind_mismatch(state: &ModelState) -> BanditError {
    BanditError::CorruptState(format!(
        "config is {} but statistics are {}",
        state.config.kind(),
        state.statistics.kind()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn actions(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_egreedy_scenario_prefers_rewarded_action() {
        let mut state = ModelState::new(
            AlgorithmConfig::EpsilonGreedy { epsilon: 0.0 },
            actions(&["A", "B"]),
        );
        for _ in 0..3 {
            state.statistics = update(&state, "A", 1.0, None).unwrap();
        }
        state.statistics = update(&state, "B", 0.0, None).unwrap();

        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(select(&state, None, &mut rng).unwrap(), 0);
    }

    #[test]
    fn test_egreedy_ignores_context() {
        let state = ModelState::new(
            AlgorithmConfig::EpsilonGreedy { epsilon: 0.0 },
            actions(&["A", "B"]),
        );
        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(select(&state, Some(&[1.0, 2.0, 3.0][..]), &mut rng).unwrap(), 0);
        assert!(update(&state, "B", 1.0, Some(&[9.0][..])).is_ok());
    }

    #[test]
    fn test_linucb_requires_context() {
        let state = ModelState::new(
            AlgorithmConfig::LinUcb {
                n_features: 2,
                alpha: 1.0,
            },
            actions(&["A", "B"]),
        );
        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(
            select(&state, None, &mut rng),
            Err(BanditError::DimensionMismatch {
                expected: 2,
                actual: 0
            })
        );
        assert_eq!(select(&state, Some(&[1.0, 0.0][..]), &mut rng).unwrap(), 0);
    }

    #[test]
    fn test_unknown_action_rejected() {
        let state = ModelState::new(
            AlgorithmConfig::EpsilonGreedy { epsilon: 0.1 },
            actions(&["A"]),
        );
        assert_eq!(
            update(&state, "Z", 1.0, None),
            Err(BanditError::UnknownAction("Z".into()))
        );
    }

    #[test]
    fn test_mismatched_state_is_corrupt() {
        let mut state = ModelState::new(
            AlgorithmConfig::EpsilonGreedy { epsilon: 0.1 },
            actions(&["A"]),
        );
        state.config = AlgorithmConfig::LinUcb {
            n_features: 1,
            alpha: 1.0,
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            select(&state, Some(&[1.0][..]), &mut rng),
            Err(BanditError::CorruptState(_))
        ));
    }

    #[test]
    fn test_inspect_reports_means_and_theta() {
        let mut state = ModelState::new(
            AlgorithmConfig::EpsilonGreedy { epsilon: 0.1 },
            actions(&["A", "B"]),
        );
        state.statistics = update(&state, "B", 3.0, None).unwrap();
        let insights = inspect(&state).unwrap();
        assert_eq!(
            insights[1],
            ActionInsight::EpsilonGreedy {
                action: "B".into(),
                count: 1,
                reward_sum: 3.0,
                mean: 3.0
            }
        );

        let state = ModelState::new(
            AlgorithmConfig::LinUcb {
                n_features: 3,
                alpha: 0.5,
            },
            actions(&["A"]),
        );
        match &inspect(&state).unwrap()[0] {
            ActionInsight::LinUcb { theta, .. } => assert_eq!(theta, &vec![0.0; 3]),
            other => panic!("unexpected insight {other:?}"),
        }
    }
}
