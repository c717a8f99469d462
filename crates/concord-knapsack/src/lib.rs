//! # Concord Knapsack
//!
//! Euclidean projection onto a box intersected with a single linear
//! equality or inequality:
//!
//! ```text
//! argmin ‖x − a‖²   s.t.   bᵀx = k  (or ≤ k),   l ≤ x ≤ u
//! ```
//!
//! This is the continuous quadratic knapsack problem. It appears every time
//! a constraint term or an active hinge term is minimized inside the ADMM
//! loop, so it runs in expected linear time using median selection over the
//! KKT breakpoints rather than sorting them.
//!
//! ## Example
//!
//! ```
//! use concord_knapsack::{project_onto_hyperplane, Bounds};
//!
//! let mut x = [0.0; 2];
//! project_onto_hyperplane(&[0.7, 0.5], &[1.0, 1.0], &[Bounds::UNIT; 2], 1.0, &mut x);
//! assert!((x[0] - 0.6).abs() < 1e-12);
//! assert!((x[1] - 0.4).abs() < 1e-12);
//! ```

mod bounds;
mod projector;

pub use bounds::Bounds;
pub use projector::{project_onto_halfspace, project_onto_hyperplane, Projector};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FP_TOLERANCE: f64 = 1e-7;

    fn dot(b: &[f64], x: &[f64]) -> f64 {
        b.iter().zip(x).map(|(b, x)| b * x).sum()
    }

    fn distance_sq(a: &[f64], x: &[f64]) -> f64 {
        a.iter().zip(x).map(|(a, x)| (a - x) * (a - x)).sum()
    }

    /// Exhaustive KKT enumeration: every coordinate is at its lower bound,
    /// at its upper bound, or free. Exponential, fine for tiny inputs.
    fn brute_force(a: &[f64], b: &[f64], bounds: &[Bounds], k: f64) -> Option<Vec<f64>> {
        let n = a.len();
        let mut best: Option<(f64, Vec<f64>)> = None;

        for code in 0..3usize.pow(n as u32) {
            let mut states = Vec::with_capacity(n);
            let mut c = code;
            for _ in 0..n {
                states.push(c % 3);
                c /= 3;
            }

            let mut pinned = 0.0;
            let mut free_ab = 0.0;
            let mut free_bb = 0.0;
            for i in 0..n {
                match states[i] {
                    0 => pinned += b[i] * bounds[i].lower,
                    1 => pinned += b[i] * bounds[i].upper,
                    _ => {
                        free_ab += a[i] * b[i];
                        free_bb += b[i] * b[i];
                    }
                }
            }

            let t = if free_bb > 0.0 {
                (pinned + free_ab - k) / free_bb
            } else {
                0.0
            };

            let x: Vec<f64> = (0..n)
                .map(|i| match states[i] {
                    0 => bounds[i].lower,
                    1 => bounds[i].upper,
                    _ => a[i] - t * b[i],
                })
                .collect();

            let feasible = (dot(b, &x) - k).abs() < 1e-9
                && x.iter()
                    .zip(bounds)
                    .all(|(x, bd)| bd.lower - 1e-12 <= *x && *x <= bd.upper + 1e-12);
            if !feasible {
                continue;
            }

            let d = distance_sq(a, &x);
            if best.as_ref().map_or(true, |(bd, _)| d < *bd) {
                best = Some((d, x));
            }
        }

        best.map(|(_, x)| x)
    }

    fn coefficient() -> impl Strategy<Value = f64> {
        (0.1f64..2.0, any::<bool>()).prop_map(|(m, neg)| if neg { -m } else { m })
    }

    /// `(a, b, k)` with `k = bᵀx₀` for some `x₀` in the unit box.
    fn unit_box_problem() -> impl Strategy<Value = (Vec<f64>, Vec<f64>, f64)> {
        (2usize..=5).prop_flat_map(|n| {
            (
                prop::collection::vec(-2.0f64..2.0, n),
                prop::collection::vec(coefficient(), n),
                prop::collection::vec(0.0f64..1.0, n),
            )
                .prop_map(|(a, b, x0)| {
                    let k = dot(&b, &x0);
                    (a, b, k)
                })
        })
    }

    /// Unit, fixed, unbounded, half-infinite and narrow finite boxes.
    fn mixed_bounds() -> impl Strategy<Value = Bounds> {
        prop_oneof![
            Just(Bounds::UNIT),
            (0.0f64..1.0).prop_map(|v| Bounds::new(v, v)),
            Just(Bounds::UNBOUNDED),
            (-1.0f64..1.0).prop_map(|l| Bounds::new(l, f64::INFINITY)),
            (-1.0f64..1.0).prop_map(|u| Bounds::new(f64::NEG_INFINITY, u)),
            (-1.5f64..0.0, 0.1f64..1.5).prop_map(|(l, w)| Bounds::new(l, l + w)),
        ]
    }

    /// A point of `bounds` picked by `s ∈ [0, 1)`.
    fn point_in(bounds: Bounds, s: f64) -> f64 {
        match (bounds.lower.is_finite(), bounds.upper.is_finite()) {
            (true, true) => bounds.lower + s * (bounds.upper - bounds.lower),
            (true, false) => bounds.lower + 2.0 * s,
            (false, true) => bounds.upper - 2.0 * s,
            (false, false) => 4.0 * s - 2.0,
        }
    }

    /// `(a, b, bounds, k)` with `k = bᵀx₀` for some `x₀` inside `bounds`.
    fn mixed_box_problem() -> impl Strategy<Value = (Vec<f64>, Vec<f64>, Vec<Bounds>, f64)> {
        (2usize..=5).prop_flat_map(|n| {
            (
                prop::collection::vec(-2.0f64..2.0, n),
                prop::collection::vec(coefficient(), n),
                prop::collection::vec(mixed_bounds(), n),
                prop::collection::vec(0.0f64..1.0, n),
            )
                .prop_map(|(a, b, bounds, s)| {
                    let x0: Vec<f64> = bounds
                        .iter()
                        .zip(&s)
                        .map(|(bd, s)| point_in(*bd, *s))
                        .collect();
                    let k = dot(&b, &x0);
                    (a, b, bounds, k)
                })
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn hyperplane_projection_matches_brute_force((a, b, k) in unit_box_problem()) {
            let bounds = vec![Bounds::UNIT; a.len()];
            let mut x = vec![0.0; a.len()];
            project_onto_hyperplane(&a, &b, &bounds, k, &mut x);

            prop_assert!((dot(&b, &x) - k).abs() < 1e-8, "bᵀx = {} but k = {}", dot(&b, &x), k);
            for xi in &x {
                prop_assert!(Bounds::UNIT.contains(*xi), "coordinate {} outside the box", xi);
            }

            let expected = brute_force(&a, &b, &bounds, k)
                .expect("problem is feasible by construction");
            prop_assert!(
                distance_sq(&a, &x) <= distance_sq(&a, &expected) + FP_TOLERANCE,
                "projector {:?} farther than brute force {:?}", x, expected
            );
            for (got, want) in x.iter().zip(&expected) {
                prop_assert!((got - want).abs() < 1e-5, "{:?} vs {:?}", x, expected);
            }
        }

        #[test]
        fn mixed_bounds_projection_matches_brute_force(
            (a, b, bounds, k) in mixed_box_problem()
        ) {
            let mut x = vec![0.0; a.len()];
            project_onto_hyperplane(&a, &b, &bounds, k, &mut x);

            prop_assert!((dot(&b, &x) - k).abs() < 1e-8, "bᵀx = {} but k = {}", dot(&b, &x), k);
            for (xi, bd) in x.iter().zip(&bounds) {
                prop_assert!(
                    bd.lower - 1e-9 <= *xi && *xi <= bd.upper + 1e-9,
                    "coordinate {} outside {:?}",
                    xi,
                    bd
                );
            }

            let expected = brute_force(&a, &b, &bounds, k)
                .expect("problem is feasible by construction");
            for (got, want) in x.iter().zip(&expected) {
                prop_assert!((got - want).abs() < 1e-5, "{:?} vs {:?}", x, expected);
            }
        }

        #[test]
        fn halfspace_projection_is_feasible_and_idempotent((a, b, k) in unit_box_problem()) {
            let bounds = vec![Bounds::UNIT; a.len()];
            let mut projector = Projector::new();

            let mut x = vec![0.0; a.len()];
            projector.project_onto_halfspace(&a, &b, &bounds, k, &mut x);
            prop_assert!(dot(&b, &x) <= k + 1e-8);

            let mut again = vec![0.0; a.len()];
            projector.project_onto_halfspace(&x, &b, &bounds, k, &mut again);
            for (p, q) in x.iter().zip(&again) {
                prop_assert!((p - q).abs() < 1e-8);
            }
        }
    }
}
