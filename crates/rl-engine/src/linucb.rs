//! LinUCB: per-action ridge regression with an upper-confidence bonus.
//!
//! Every action sees the same context vector `x`. For each action the score
//! is `θ·x + alpha·sqrt(xᵀA⁻¹x)` with `θ = A⁻¹b`. Both `A⁻¹x` and `A⁻¹b` come
//! from a Cholesky solve against `A`; the inverse is never formed. The stored
//! `A` and `b` are the only persisted state, so each selection pays one
//! O(n³) factorization per action and nothing drifts between updates.

use bandit_core::{BanditError, BanditResult, LinUcbArm};
use ndarray::{Array1, Array2, ArrayView1};
use serde::Serialize;

/// Score breakdown for one action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArmScore {
    pub exploitation: f64,
    pub exploration: f64,
    pub score: f64,
}

/// Reject contexts of the wrong length or with non-finite entries.
pub fn check_context(context: &[f64], n: usize) -> BanditResult<()> {
    if context.len() != n {
        return Err(BanditError::DimensionMismatch {
            expected: n,
            actual: context.len(),
        });
    }
    if context.iter().any(|v| !v.is_finite()) {
        return Err(BanditError::InvalidContext);
    }
    Ok(())
}

/// Score every action against `context`.
pub fn scores(
    arms: &[LinUcbArm],
    n: usize,
    alpha: f64,
    context: &[f64],
) -> BanditResult<Vec<ArmScore>> {
    check_context(context, n)?;
    let x = ArrayView1::from(context);

    arms.iter()
        .enumerate()
        .map(|(i, arm)| {
            let l = factor(arm, n, i)?;
            let theta = cholesky_solve(&l, ArrayView1::from(&arm.b[..]));
            let a_inv_x = cholesky_solve(&l, x);
            let exploitation = theta.dot(&x);
            // xᵀA⁻¹x is non-negative for SPD A; clamp rounding noise.
            let exploration = alpha * x.dot(&a_inv_x).max(0.0).sqrt();
            Ok(ArmScore {
                exploitation,
                exploration,
                score: exploitation + exploration,
            })
        })
        .collect()
}

/// Pick the action index with the highest upper-confidence score.
/// Ties go to the earliest action.
pub fn select(arms: &[LinUcbArm], n: usize, alpha: f64, context: &[f64]) -> BanditResult<usize> {
    if arms.is_empty() {
        return Err(BanditError::InvalidConfig("model has no actions".into()));
    }

    let scored = scores(arms, n, alpha, context)?;
    let mut best_index = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (i, s) in scored.iter().enumerate() {
        if s.score > best_score {
            best_score = s.score;
            best_index = i;
        }
    }

    Ok(best_index)
}

/// Return new statistics with `A += x xᵀ` and `b += reward·x` applied to `index`.
pub fn update(
    arms: &[LinUcbArm],
    n: usize,
    index: usize,
    context: &[f64],
    reward: f64,
) -> BanditResult<Vec<LinUcbArm>> {
    check_context(context, n)?;
    if !reward.is_finite() {
        return Err(BanditError::InvalidReward(reward));
    }

    let mut next = arms.to_vec();
    let arm = next
        .get_mut(index)
        .ok_or_else(|| BanditError::UnknownAction(format!("#{index}")))?;

    let x = ArrayView1::from(context);
    let a = as_matrix(arm, n, index)? + outer(x);
    arm.a = a.iter().copied().collect();
    for (bi, xi) in arm.b.iter_mut().zip(x.iter()) {
        *bi += reward * xi;
    }
    // Finite inputs can still overflow the accumulated statistics.
    if arm.a.iter().any(|v| !v.is_finite()) {
        return Err(BanditError::InvalidContext);
    }
    if arm.b.iter().any(|v| !v.is_finite()) {
        return Err(BanditError::InvalidReward(reward));
    }

    Ok(next)
}

/// Ridge weight estimate `θ = A⁻¹b` for one action.
pub fn theta(arm: &LinUcbArm, n: usize, index: usize) -> BanditResult<Array1<f64>> {
    let l = factor(arm, n, index)?;
    Ok(cholesky_solve(&l, ArrayView1::from(&arm.b[..])))
}

fn as_matrix(arm: &LinUcbArm, n: usize, index: usize) -> BanditResult<Array2<f64>> {
    Array2::from_shape_vec((n, n), arm.a.clone()).map_err(|_| {
        BanditError::CorruptState(format!(
            "design matrix for action #{index} has {} entries, expected {}",
            arm.a.len(),
            n * n
        ))
    })
}

fn factor(arm: &LinUcbArm, n: usize, index: usize) -> BanditResult<Array2<f64>> {
    if arm.b.len() != n {
        return Err(BanditError::CorruptState(format!(
            "reward vector for action #{index} has {} entries, expected {n}",
            arm.b.len()
        )));
    }
    let a = as_matrix(arm, n, index)?;
    cholesky(&a).ok_or_else(|| {
        BanditError::CorruptState(format!(
            "design matrix for action #{index} is not positive-definite"
        ))
    })
}

fn outer(x: ArrayView1<f64>) -> Array2<f64> {
    let n = x.len();
    Array2::from_shape_fn((n, n), |(i, j)| x[i] * x[j])
}

/// Lower-triangular `L` with `A = L Lᵀ`, or `None` if `A` is not SPD.
pub(crate) fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return None;
    }
    let mut l = Array2::<f64>::zeros((n, n));

    for j in 0..n {
        let mut d = a[[j, j]];
        for k in 0..j {
            d -= l[[j, k]] * l[[j, k]];
        }
        if !d.is_finite() || d <= 0.0 {
            return None;
        }
        let ljj = d.sqrt();
        l[[j, j]] = ljj;

        for i in (j + 1)..n {
            let mut s = a[[i, j]];
            for k in 0..j {
                s -= l[[i, k]] * l[[j, k]];
            }
            l[[i, j]] = s / ljj;
        }
    }

    Some(l)
}

/// Solve `L Lᵀ y = rhs` by forward then backward substitution.
fn cholesky_solve(l: &Array2<f64>, rhs: ArrayView1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut s = rhs[i];
        for k in 0..i {
            s -= l[[i, k]] * z[k];
        }
        z[i] = s / l[[i, i]];
    }

    let mut y = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut s = z[i];
        for k in (i + 1)..n {
            s -= l[[k, i]] * y[k];
        }
        y[i] = s / l[[i, i]];
    }
    y
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn fresh(arms: usize, n: usize) -> Vec<LinUcbArm> {
        vec![LinUcbArm::identity(n); arms]
    }

    #[test]
    fn test_cold_start_ties_go_to_first() {
        let arms = fresh(2, 2);
        let scored = scores(&arms, 2, 1.0, &[1.0, 0.0]).unwrap();
        for s in &scored {
            assert_eq!(s.exploitation, 0.0);
            assert!((s.exploration - 1.0).abs() < 1e-12);
        }
        assert_eq!(select(&arms, 2, 1.0, &[1.0, 0.0]).unwrap(), 0);
    }

    #[test]
    fn test_dimension_mismatch_for_all_sizes() {
        for n in 1..=6 {
            let arms = fresh(2, n);
            for len in [0, n - 1, n + 1, 2 * n + 1] {
                if len == n {
                    continue;
                }
                let x = vec![0.5; len];
                assert_eq!(
                    select(&arms, n, 1.0, &x),
                    Err(BanditError::DimensionMismatch {
                        expected: n,
                        actual: len
                    })
                );
                assert_eq!(
                    update(&arms, n, 0, &x, 1.0),
                    Err(BanditError::DimensionMismatch {
                        expected: n,
                        actual: len
                    })
                );
            }
        }
    }

    #[test]
    fn test_non_finite_inputs_rejected() {
        let arms = fresh(1, 2);
        assert_eq!(
            select(&arms, 2, 1.0, &[f64::NAN, 0.0]),
            Err(BanditError::InvalidContext)
        );
        assert!(matches!(
            update(&arms, 2, 0, &[1.0, 0.0], f64::INFINITY),
            Err(BanditError::InvalidReward(_))
        ));
    }

    #[test]
    fn test_update_rejects_overflowing_statistics() {
        let arms = fresh(2, 2);
        assert_eq!(
            update(&arms, 2, 0, &[1e200, 0.0], 1.0),
            Err(BanditError::InvalidContext)
        );

        let mut big_b = fresh(1, 2);
        big_b[0].b = vec![1e308, 0.0];
        assert_eq!(
            update(&big_b, 2, 0, &[1.0, 0.0], 1e308),
            Err(BanditError::InvalidReward(1e308))
        );
    }

    #[test]
    fn test_theta_error_names_the_action() {
        let broken = LinUcbArm {
            a: vec![-1.0, 0.0, 0.0, 1.0],
            b: vec![0.0, 0.0],
        };
        match theta(&broken, 2, 3) {
            Err(BanditError::CorruptState(msg)) => assert!(msg.contains("#3"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_update_is_rank_one() {
        let arms = fresh(2, 2);
        let next = update(&arms, 2, 1, &[1.0, 2.0], 0.5).unwrap();
        assert_eq!(next[1].a, vec![2.0, 2.0, 2.0, 5.0]);
        assert_eq!(next[1].b, vec![0.5, 1.0]);
        assert_eq!(next[0], arms[0]);
    }

    #[test]
    fn test_accumulated_updates_stay_spd() {
        let mut rng = StdRng::seed_from_u64(17);
        for n in 1..=5 {
            let mut arms = fresh(1, n);
            for _ in 0..200 {
                let x: Vec<f64> = (0..n).map(|_| rng.gen_range(-3.0..3.0)).collect();
                arms = update(&arms, n, 0, &x, rng.gen_range(-1.0..1.0)).unwrap();
                let a = Array2::from_shape_vec((n, n), arms[0].a.clone()).unwrap();
                for i in 0..n {
                    for j in 0..n {
                        assert_eq!(a[[i, j]], a[[j, i]], "asymmetric at ({i},{j})");
                    }
                }
                assert!(cholesky(&a).is_some(), "lost positive-definiteness");
            }
        }
    }

    #[test]
    fn test_learns_rewarding_direction() {
        let mut arms = fresh(2, 2);
        for _ in 0..50 {
            arms = update(&arms, 2, 0, &[1.0, 0.0], 1.0).unwrap();
            arms = update(&arms, 2, 1, &[1.0, 0.0], 0.0).unwrap();
        }
        assert_eq!(select(&arms, 2, 0.1, &[1.0, 0.0]).unwrap(), 0);
        let t = theta(&arms[0], 2, 0).unwrap();
        // θ = 50 / 51 along the first axis.
        assert!((t[0] - 50.0 / 51.0).abs() < 1e-12);
        assert!(t[1].abs() < 1e-12);
    }

    #[test]
    fn test_solve_matches_known_inverse() {
        // A = [[4, 2], [2, 3]], A⁻¹ = 1/8 [[3, -2], [-2, 4]]
        let a = Array2::from_shape_vec((2, 2), vec![4.0, 2.0, 2.0, 3.0]).unwrap();
        let l = cholesky(&a).unwrap();
        let y = cholesky_solve(&l, ArrayView1::from(&[1.0, 1.0][..]));
        assert!((y[0] - 0.125).abs() < 1e-12);
        assert!((y[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_indefinite_matrix_reported_as_corrupt() {
        let arms = vec![LinUcbArm {
            a: vec![1.0, 2.0, 2.0, 1.0],
            b: vec![0.0, 0.0],
        }];
        assert!(matches!(
            select(&arms, 2, 1.0, &[1.0, 0.0]),
            Err(BanditError::CorruptState(_))
        ));
    }
}
