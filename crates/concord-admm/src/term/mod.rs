//! Objective terms: one per grounded rule per round.
//!
//! A term holds local copies `x` of the consensus values of its atoms and
//! the matching dual variables `y`. Each iteration it solves
//!
//! ```text
//! x ← argmin f(x) + ρ/2·‖x − z + y/ρ‖²
//! ```
//!
//! for its own `f`, reading only `z` at its own slots. Writing `a = z − y/ρ`,
//! every variant reduces to a small problem in `a`:
//!
//! | Variant            | `f(x)`                 | Solve                                |
//! |--------------------|------------------------|--------------------------------------|
//! | Linear loss        | `w·cᵀx`                | shift by `w·c/ρ`                     |
//! | Linear constraint  | `0` or `∞`             | box projection, knapsack if violated |
//! | Hinge              | `w·max(cᵀx − k, 0)`    | three-case, knapsack on `cᵀx = k`    |
//! | Squared hinge      | `w·max(cᵀx − k, 0)²`   | inactive check, then squared solve   |
//! | Squared hyperplane | `w·(cᵀx − k)²`         | closed form for 1–2, Cholesky above  |

mod hinge;
mod hyperplane;
mod linear;

use std::sync::Arc;

use concord_knapsack::{Bounds, Projector};
use concord_model::{Comparator, GroundRuleId, CONSTRAINT_TOLERANCE};

use crate::cholesky::{CholeskyFactor, FactorCache};
use crate::error::Result;

/// How a squared-hyperplane system is solved.
#[derive(Debug, Clone)]
pub enum QuadraticSolve {
    /// One variable.
    Scalar,
    /// Two variables, eliminated by hand.
    Pair,
    /// Three or more, through a shared factor.
    Factored(Arc<CholeskyFactor>),
}

impl QuadraticSolve {
    /// Pick the solve for `c`, resolving the factor through `cache` when needed.
    pub fn new(
        coefficients: &[f64],
        weight: f64,
        step_size: f64,
        cache: &mut FactorCache,
    ) -> Result<Self> {
        Ok(match coefficients.len() {
            0 | 1 => QuadraticSolve::Scalar,
            2 => QuadraticSolve::Pair,
            _ => QuadraticSolve::Factored(cache.get_or_factor(coefficients, weight, step_size)?),
        })
    }
}

/// Variant of an objective term.
#[derive(Debug, Clone)]
pub enum TermKind {
    LinearLoss { weight: f64 },
    LinearConstraint { comparator: Comparator },
    Hinge { weight: f64 },
    SquaredHinge { weight: f64, solve: QuadraticSolve },
    SquaredHyperplane { weight: f64, solve: QuadraticSolve },
}

impl TermKind {
    /// Weight of a loss term, `None` for constraints.
    pub fn weight(&self) -> Option<f64> {
        match self {
            TermKind::LinearLoss { weight }
            | TermKind::Hinge { weight }
            | TermKind::SquaredHinge { weight, .. }
            | TermKind::SquaredHyperplane { weight, .. } => Some(*weight),
            TermKind::LinearConstraint { .. } => None,
        }
    }
}

/// Per-thread scratch space for [`ObjectiveTerm::minimize`].
#[derive(Debug, Default)]
pub struct Workspace {
    projector: Projector,
    point: Vec<f64>,
    unbounded: Vec<Bounds>,
    negated: Vec<f64>,
    rhs: Vec<f64>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One grounded rule's share of the objective.
#[derive(Debug, Clone)]
pub struct ObjectiveTerm {
    rule: GroundRuleId,
    kind: TermKind,
    coefficients: Vec<f64>,
    k: f64,
    bounds: Vec<Bounds>,
    slots: Vec<usize>,
    x: Vec<f64>,
    y: Vec<f64>,
}

impl ObjectiveTerm {
    /// Build a term over consensus `slots`, with `x` starting at `z` and `y` at zero.
    ///
    /// The function is `cᵀx − k` (wrapped per `kind`) or, for constraints,
    /// `cᵀx ⋈ k`.
    pub fn new(
        rule: GroundRuleId,
        kind: TermKind,
        coefficients: Vec<f64>,
        k: f64,
        bounds: Vec<Bounds>,
        slots: Vec<usize>,
        z: &[f64],
    ) -> Self {
        debug_assert_eq!(coefficients.len(), bounds.len());
        debug_assert_eq!(coefficients.len(), slots.len());

        let x = slots.iter().map(|&s| z[s]).collect();
        let y = vec![0.0; slots.len()];
        Self {
            rule,
            kind,
            coefficients,
            k,
            bounds,
            slots,
            x,
            y,
        }
    }

    pub fn rule(&self) -> GroundRuleId {
        self.rule
    }

    pub fn kind(&self) -> &TermKind {
        &self.kind
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn k(&self) -> f64 {
        self.k
    }

    /// Consensus slot of each local variable.
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    /// Local copies.
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Dual variables.
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Number of local variables.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Solve the local subproblem against consensus values `z`.
    pub fn minimize(&mut self, z: &[f64], step_size: f64, workspace: &mut Workspace) {
        let Workspace {
            projector,
            point,
            unbounded,
            negated,
            rhs,
        } = workspace;

        point.clear();
        point.extend(
            self.slots
                .iter()
                .zip(&self.y)
                .map(|(&slot, y)| z[slot] - y / step_size),
        );

        let c = &self.coefficients;
        match &self.kind {
            TermKind::LinearLoss { weight } => {
                linear::minimize_loss(point, c, *weight, step_size, &mut self.x)
            }
            TermKind::LinearConstraint { comparator } => linear::minimize_constraint(
                point,
                c,
                self.k,
                *comparator,
                &self.bounds,
                projector,
                negated,
                &mut self.x,
            ),
            TermKind::Hinge { weight } => hinge::minimize_hinge(
                point,
                c,
                self.k,
                *weight,
                step_size,
                projector,
                unbounded,
                &mut self.x,
            ),
            TermKind::SquaredHinge { weight, solve } => hinge::minimize_squared_hinge(
                point,
                c,
                self.k,
                *weight,
                step_size,
                solve,
                rhs,
                &mut self.x,
            ),
            TermKind::SquaredHyperplane { weight, solve } => {
                hyperplane::minimize_squared_hyperplane(
                    point,
                    c,
                    self.k,
                    *weight,
                    step_size,
                    solve,
                    rhs,
                    &mut self.x,
                )
            }
        }
    }

    /// Dual ascent: `y += ρ·(x − z)`.
    pub fn update_dual(&mut self, z: &[f64], step_size: f64) {
        for ((y, x), &slot) in self.y.iter_mut().zip(&self.x).zip(&self.slots) {
            *y += step_size * (x - z[slot]);
        }
    }

    #[cfg(test)]
    pub(crate) fn set_local_values(&mut self, x: &[f64]) {
        self.x.copy_from_slice(x);
    }

    /// Unweighted incompatibility at the local copies.
    pub fn incompatibility(&self) -> f64 {
        let lhs = dot(&self.coefficients, &self.x);
        let v = lhs - self.k;
        match &self.kind {
            TermKind::LinearLoss { .. } => v,
            TermKind::Hinge { .. } => v.max(0.0),
            TermKind::SquaredHinge { .. } => {
                let h = v.max(0.0);
                h * h
            }
            TermKind::SquaredHyperplane { .. } => v * v,
            TermKind::LinearConstraint { comparator } => {
                if comparator.holds(lhs, self.k, CONSTRAINT_TOLERANCE) {
                    0.0
                } else {
                    f64::INFINITY
                }
            }
        }
    }
}

#[inline]
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(a, b)| a * b).sum()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dual_update_moves_toward_disagreement() {
        let z = [0.5, 0.25];
        let mut term = ObjectiveTerm::new(
            GroundRuleId(1),
            TermKind::LinearLoss { weight: 1.0 },
            vec![1.0, 1.0],
            0.0,
            vec![Bounds::UNIT; 2],
            vec![1, 0],
            &z,
        );
        assert_eq!(term.x(), &[0.25, 0.5]);

        term.set_local_values(&[0.75, 0.5]);
        term.update_dual(&z, 2.0);
        assert_eq!(term.y(), &[1.0, 0.0]);
    }

    #[test]
    fn incompatibility_per_variant() {
        let z = [0.5, 0.5];
        let make = |kind| {
            ObjectiveTerm::new(
                GroundRuleId(1),
                kind,
                vec![1.0, 1.0],
                0.8,
                vec![Bounds::UNIT; 2],
                vec![0, 1],
                &z,
            )
        };

        let loss = make(TermKind::LinearLoss { weight: 3.0 });
        assert!((loss.incompatibility() - 0.2).abs() < 1e-12);

        let hinge = make(TermKind::Hinge { weight: 3.0 });
        assert!((hinge.incompatibility() - 0.2).abs() < 1e-12);

        let squared = make(TermKind::SquaredHinge {
            weight: 3.0,
            solve: QuadraticSolve::Pair,
        });
        assert!((squared.incompatibility() - 0.04).abs() < 1e-12);

        let le = make(TermKind::LinearConstraint {
            comparator: Comparator::Lte,
        });
        assert_eq!(le.incompatibility(), f64::INFINITY);
        assert_eq!(le.kind().weight(), None);

        let ge = make(TermKind::LinearConstraint {
            comparator: Comparator::Gte,
        });
        assert_eq!(ge.incompatibility(), 0.0);
    }

    #[test]
    fn quadratic_solve_by_size() {
        let mut cache = FactorCache::new();
        assert!(matches!(
            QuadraticSolve::new(&[1.0], 1.0, 1.0, &mut cache).unwrap(),
            QuadraticSolve::Scalar
        ));
        assert!(matches!(
            QuadraticSolve::new(&[1.0, 2.0], 1.0, 1.0, &mut cache).unwrap(),
            QuadraticSolve::Pair
        ));
        assert!(matches!(
            QuadraticSolve::new(&[1.0, 2.0, 3.0], 1.0, 1.0, &mut cache).unwrap(),
            QuadraticSolve::Factored(_)
        ));
        assert_eq!(cache.len(), 1);
    }
}
