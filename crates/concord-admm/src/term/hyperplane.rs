//! Squared hyperplane terms.

use super::QuadraticSolve;

/// `argmin w·(cᵀx − k)² + ρ/2·‖x − a‖²`
///
/// Solves `(2w·ccᵀ + ρI)·x = ρa + 2w·c·k`.
#[allow(clippy::too_many_arguments)]
pub(super) fn minimize_squared_hyperplane(
    a: &[f64],
    c: &[f64],
    k: f64,
    weight: f64,
    step_size: f64,
    solve: &QuadraticSolve,
    rhs: &mut Vec<f64>,
    x: &mut [f64],
) {
    let w2 = 2.0 * weight;
    match solve {
        QuadraticSolve::Scalar => {
            if let (Some(&c0), Some(&a0)) = (c.first(), a.first()) {
                x[0] = (step_size * a0 + w2 * c0 * k) / (w2 * c0 * c0 + step_size);
            }
        }
        QuadraticSolve::Pair => {
            let r0 = step_size * a[0] + w2 * c[0] * k;
            let r1 = step_size * a[1] + w2 * c[1] * k;
            let m00 = w2 * c[0] * c[0] + step_size;
            let m11 = w2 * c[1] * c[1] + step_size;
            let m01 = w2 * c[0] * c[1];

            x[1] = (r1 - m01 * r0 / m00) / (m11 - m01 * m01 / m00);
            x[0] = (r0 - m01 * x[1]) / m00;
        }
        QuadraticSolve::Factored(factor) => {
            rhs.clear();
            rhs.extend(
                a.iter()
                    .zip(c)
                    .map(|(a, c)| step_size * a + w2 * c * k),
            );
            factor.solve(rhs, x);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{assert_close, minimized};
    use super::super::{QuadraticSolve, TermKind};
    use crate::cholesky::FactorCache;

    fn squared_hyperplane(c: &[f64], weight: f64, step_size: f64) -> TermKind {
        let solve = QuadraticSolve::new(c, weight, step_size, &mut FactorCache::new()).unwrap();
        TermKind::SquaredHyperplane { weight, solve }
    }

    #[test]
    fn three_variables_through_factor() {
        let c = [0.3, -1.0, 0.4];
        let x = minimized(
            squared_hyperplane(&c, 0.5, 2.0),
            &c,
            -20.0,
            &[0.4, 0.5, 0.1],
            &[0.0, 0.0, -0.05],
            2.0,
        );
        assert_close(&x, &[-1.41569, 6.55231, -2.29593]);
    }

    #[test]
    fn pair_matches_factored_solve() {
        // The two-variable elimination and a Cholesky solve of the same system agree.
        let c = [0.7, -1.3];
        let (a, k, weight, step_size) = ([0.25, 0.6], 0.4, 1.5, 0.3);

        let kind = squared_hyperplane(&c, weight, step_size);
        let pair = minimized(kind, &c, k, &a, &[0.0; 2], step_size);

        let factor =
            crate::cholesky::CholeskyFactor::squared_hyperplane(&c, weight, step_size).unwrap();
        let rhs: Vec<f64> = a
            .iter()
            .zip(&c)
            .map(|(a, c)| step_size * a + 2.0 * weight * c * k)
            .collect();
        let mut expected = [0.0; 2];
        factor.solve(&rhs, &mut expected);

        assert_close(&pair, &expected);
    }

    #[test]
    fn single_variable_closed_form() {
        // (2·1·1 + 1)·x = 1·0.5 + 2·1·1·1
        let c = [1.0];
        let kind = squared_hyperplane(&c, 1.0, 1.0);
        let x = minimized(kind, &c, 1.0, &[0.5], &[0.0], 1.0);
        assert_close(&x, &[2.5 / 3.0]);
    }
}
