//! Linear loss and linear constraint terms.

use concord_knapsack::{Bounds, Projector};
use concord_model::Comparator;

/// `argmin w·cᵀx + ρ/2·‖x − a‖²`, unboxed.
pub(super) fn minimize_loss(a: &[f64], c: &[f64], weight: f64, step_size: f64, x: &mut [f64]) {
    for i in 0..a.len() {
        x[i] = a[i] - weight * c[i] / step_size;
    }
}

/// Project `a` onto `{x ∈ box : cᵀx ⋈ k}`.
///
/// Inequalities keep the box projection when it satisfies them. Otherwise
/// the constraint is active and the answer lies on `cᵀx = k`. `negated` holds
/// `−c` for `≥`.
#[allow(clippy::too_many_arguments)]
pub(super) fn minimize_constraint(
    a: &[f64],
    c: &[f64],
    k: f64,
    comparator: Comparator,
    bounds: &[Bounds],
    projector: &mut Projector,
    negated: &mut Vec<f64>,
    x: &mut [f64],
) {
    match comparator {
        Comparator::Eq => projector.project_onto_hyperplane(a, c, bounds, k, x),
        Comparator::Lte => projector.project_onto_halfspace(a, c, bounds, k, x),
        Comparator::Gte => {
            negated.clear();
            negated.extend(c.iter().map(|c| -c));
            projector.project_onto_halfspace(a, negated, bounds, -k, x);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{assert_close, minimized};
    use super::super::TermKind;
    use concord_model::Comparator;

    fn constraint(comparator: Comparator) -> TermKind {
        TermKind::LinearConstraint { comparator }
    }

    #[test]
    fn loss_shifts_against_gradient() {
        let x = minimized(
            TermKind::LinearLoss { weight: 1.0 },
            &[0.3, -1.0],
            0.0,
            &[0.4, 0.5],
            &[0.0, 0.0],
            1.0,
        );
        assert_close(&x, &[0.1, 1.5]);
    }

    #[test]
    fn inequality_already_satisfied() {
        let x = minimized(
            constraint(Comparator::Lte),
            &[1.0, 1.0],
            1.0,
            &[0.2, 0.5],
            &[0.0, 0.0],
            1.0,
        );
        assert_close(&x, &[0.2, 0.5]);
    }

    #[test]
    fn inequality_violated_projects() {
        let x = minimized(
            constraint(Comparator::Lte),
            &[1.0, 1.0],
            1.0,
            &[0.7, 0.5],
            &[0.0, 0.0],
            1.0,
        );
        assert_close(&x, &[0.6, 0.4]);
    }

    #[test]
    fn greater_or_equal_violated_projects() {
        let x = minimized(
            constraint(Comparator::Gte),
            &[1.0, 1.0],
            1.0,
            &[0.1, 0.3],
            &[0.0, 0.0],
            1.0,
        );
        assert_close(&x, &[0.4, 0.6]);
    }

    #[test]
    fn greater_or_equal_keeps_box_projection() {
        // Clamping a = (1.4, 0.5) already gives x1 + x2 ≥ 1.
        let x = minimized(
            constraint(Comparator::Gte),
            &[1.0, 1.0],
            1.0,
            &[1.4, 0.5],
            &[0.0, 0.0],
            1.0,
        );
        assert_close(&x, &[1.0, 0.5]);
    }

    #[test]
    fn equality_always_projects() {
        let x = minimized(
            constraint(Comparator::Eq),
            &[1.0, -1.0],
            0.0,
            &[0.7, 0.5],
            &[0.0, 0.0],
            1.0,
        );
        assert_close(&x, &[0.6, 0.6]);
    }

    #[test]
    fn constraint_stays_in_box() {
        // a = (1.4, −0.2) after the dual shift; the box pins x1 at 0.
        let x = minimized(
            constraint(Comparator::Eq),
            &[1.0, 1.0],
            1.0,
            &[0.9, 0.1],
            &[-0.5, 0.3],
            1.0,
        );
        assert_close(&x, &[1.0, 0.0]);
    }
}
