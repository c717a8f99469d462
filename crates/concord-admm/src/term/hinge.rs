//! Hinge and squared hinge loss terms.

use concord_knapsack::{Bounds, Projector};

use super::hyperplane::minimize_squared_hyperplane;
use super::{dot, QuadraticSolve};

/// `argmin w·max(cᵀx − k, 0) + ρ/2·‖x − a‖²`
///
/// Three cases, tried in order:
/// 1. `a` is on the inactive side of the hinge: `x = a`.
/// 2. The full-loss step `a − w·c/ρ` stays on the active side: take it.
/// 3. Otherwise the optimum is the projection of `a` onto `cᵀx = k`.
#[allow(clippy::too_many_arguments)]
pub(super) fn minimize_hinge(
    a: &[f64],
    c: &[f64],
    k: f64,
    weight: f64,
    step_size: f64,
    projector: &mut Projector,
    unbounded: &mut Vec<Bounds>,
    x: &mut [f64],
) {
    let ca = dot(c, a);
    if ca <= k {
        x.copy_from_slice(a);
        return;
    }

    let shift = weight / step_size;
    if ca - shift * dot(c, c) >= k {
        for i in 0..a.len() {
            x[i] = a[i] - shift * c[i];
        }
        return;
    }

    unbounded.clear();
    unbounded.resize(a.len(), Bounds::UNBOUNDED);
    projector.project_onto_hyperplane(a, c, unbounded, k, x);
}

/// `argmin w·max(cᵀx − k, 0)² + ρ/2·‖x − a‖²`
///
/// If `a` is inactive it is optimal. Otherwise the hinge is active at the
/// optimum and the term behaves like a squared hyperplane.
#[allow(clippy::too_many_arguments)]
pub(super) fn minimize_squared_hinge(
    a: &[f64],
    c: &[f64],
    k: f64,
    weight: f64,
    step_size: f64,
    solve: &QuadraticSolve,
    rhs: &mut Vec<f64>,
    x: &mut [f64],
) {
    if dot(c, a) <= k {
        x.copy_from_slice(a);
        return;
    }
    minimize_squared_hyperplane(a, c, k, weight, step_size, solve, rhs, x);
}

#[cfg(test)]
mod tests {
    use super::super::testing::{assert_close, minimized};
    use super::super::{QuadraticSolve, TermKind};
    use super::*;
    use crate::cholesky::FactorCache;
    use concord_knapsack::project_onto_hyperplane;
    use proptest::prelude::*;

    fn hinge(weight: f64) -> TermKind {
        TermKind::Hinge { weight }
    }

    fn squared_hinge(c: &[f64], weight: f64, step_size: f64) -> TermKind {
        let solve = QuadraticSolve::new(c, weight, step_size, &mut FactorCache::new()).unwrap();
        TermKind::SquaredHinge { weight, solve }
    }

    #[test]
    fn hinge_projects_onto_hyperplane() {
        let (c, z) = ([1.0, -1.0], [0.2, 0.5]);
        let x = minimized(hinge(1.0), &c, -0.95, &z, &[0.0; 2], 1.0);
        assert_close(&x, &[-0.125, 0.825]);
    }

    #[test]
    fn hinge_three_variables_with_duals() {
        let c = [1.0, -0.5, 0.4];
        let z = [0.3, 0.5, 0.1];
        let y = [0.1, 0.0, -0.05];

        let x = minimized(hinge(1.0), &c, -0.15, &z, &y, 0.5);
        assert_close(&x, &[0.043257, 0.528361, 0.177309]);

        // Shifted point already inactive.
        let x = minimized(hinge(2.0), &c, 0.0, &z, &y, 0.5);
        assert_close(&x, &[0.1, 0.5, 0.2]);
    }

    #[test]
    fn hinge_single_variable_inactive() {
        let x = minimized(hinge(2.0), &[1.0], 0.0, &[0.1], &[0.15], 1.0);
        assert_close(&x, &[-0.05]);
    }

    #[test]
    fn hinge_symmetric_pull() {
        let (c, z) = ([1.0, -1.0], [0.7, 0.5]);
        let x = minimized(hinge(1.0), &c, 0.0, &z, &[0.0; 2], 1.0);
        assert_close(&x, &[0.6, 0.6]);

        let x = minimized(hinge(2.0), &c, -0.5, &z, &[0.05, 1.0], 2.0);
        assert_close(&x, &[0.0875, 0.5875]);
    }

    #[test]
    fn hinge_full_loss_step() {
        // a = 2, step to 2 − 0.5 = 1.5 still above k = 1.
        let x = minimized(hinge(0.5), &[1.0], 1.0, &[2.0], &[0.0], 1.0);
        assert_close(&x, &[1.5]);
    }

    #[test]
    fn squared_hinge_two_variables() {
        let c = [1.0, -1.0];
        let z = [0.2, 0.5];
        let x = minimized(squared_hinge(&c, 1.0, 1.0), &c, -0.95, &z, &[0.0; 2], 1.0);
        assert_close(&x, &[-0.06, 0.76]);

        let z = [0.7, 0.5];
        let x = minimized(squared_hinge(&c, 1.0, 1.0), &c, 0.0, &z, &[0.0; 2], 1.0);
        assert_close(&x, &[0.62, 0.58]);
    }

    #[test]
    fn squared_hinge_three_variables_with_duals() {
        let c = [1.0, -0.5, 0.4];
        let z = [0.3, 0.5, 0.1];
        let y = [0.1, 0.0, -0.05];

        let x = minimized(squared_hinge(&c, 1.0, 0.5), &c, -0.15, &z, &y, 0.5);
        assert_close(&x, &[0.051798, 0.524096, 0.180720]);

        let x = minimized(squared_hinge(&c, 2.0, 0.5), &c, 0.0, &z, &y, 0.5);
        assert_close(&x, &[0.1, 0.5, 0.2]);
    }

    #[test]
    fn squared_hinge_single_variable() {
        let c = [1.0];
        let x = minimized(squared_hinge(&c, 2.0, 1.0), &c, 0.0, &[0.1], &[-0.15], 1.0);
        assert_close(&x, &[0.05]);
    }

    #[test]
    fn squared_hinge_reuses_cached_factor() {
        let c = [1.0, -1.0, 0.5];
        let mut cache = FactorCache::new();
        for _ in 0..3 {
            let solve = QuadraticSolve::new(&c, 2.0, 2.0, &mut cache).unwrap();
            let kind = TermKind::SquaredHinge { weight: 2.0, solve };
            let x = minimized(kind, &c, -0.5, &[3.7, -0.5, 0.5], &[0.0; 3], 2.0);
            assert_close(&x, &[1.9, 1.3, -0.4]);
        }
        assert_eq!((cache.misses(), cache.hits()), (1, 2));
    }

    /// Direct minimization of the one-variable hinge objective by checking
    /// every candidate stationary point.
    fn hinge_by_candidates(a: f64, c: f64, k: f64, weight: f64, step_size: f64) -> f64 {
        let objective = |x: f64| weight * (c * x - k).max(0.0) + 0.5 * step_size * (x - a).powi(2);
        [a, a - weight * c / step_size, k / c]
            .into_iter()
            .min_by(|p, q| objective(*p).total_cmp(&objective(*q)))
            .unwrap_or(a)
    }

    proptest! {
        #![proptest_config(ProptestConfig { max_global_rejects: 8192, ..ProptestConfig::with_cases(512) })]

        #[test]
        fn single_variable_hinge_matches_candidate_search(
            a in -2.0f64..2.0,
            magnitude in 0.1f64..3.0,
            negative in any::<bool>(),
            k in -1.5f64..1.5,
            weight in 0.0f64..5.0,
            step_size in 0.1f64..10.0,
        ) {
            let c = if negative { -magnitude } else { magnitude };
            let mut x = [0.0];
            minimize_hinge(
                &[a],
                &[c],
                k,
                weight,
                step_size,
                &mut Projector::new(),
                &mut Vec::new(),
                &mut x,
            );
            let expected = hinge_by_candidates(a, c, k, weight, step_size);
            prop_assert!(
                (x[0] - expected).abs() < 1e-6,
                "got {} want {}",
                x[0],
                expected
            );
        }

        #[test]
        fn single_variable_kink_matches_projector(
            a in -2.0f64..2.0,
            magnitude in 0.1f64..3.0,
            negative in any::<bool>(),
            k in -1.5f64..1.5,
            weight in 0.0f64..5.0,
            step_size in 0.1f64..10.0,
        ) {
            let c = if negative { -magnitude } else { magnitude };
            // Active at a, inactive after the full-loss step.
            prop_assume!(c * a > k && c * a - weight / step_size * c * c < k);

            let mut x = [0.0];
            minimize_hinge(
                &[a],
                &[c],
                k,
                weight,
                step_size,
                &mut Projector::new(),
                &mut Vec::new(),
                &mut x,
            );
            let mut expected = [0.0];
            project_onto_hyperplane(&[a], &[c], &[Bounds::UNBOUNDED], k, &mut expected);
            prop_assert!(
                (x[0] - expected[0]).abs() < 1e-6,
                "got {} want {}",
                x[0],
                expected[0]
            );
        }
    }
}
