//! Kiwiel's breakpoint search for the continuous quadratic knapsack problem.
//!
//! # Problem
//!
//! ```text
//! minimize    Σ ½·(xᵢ − aᵢ)²
//! subject to  Σ bᵢ·xᵢ = k,   lᵢ ≤ xᵢ ≤ uᵢ,   bᵢ ≠ 0
//! ```
//!
//! Dimensions with `bᵢ < 0` are mirrored (`xᵢ ↦ −xᵢ`) so every coefficient is
//! positive. The KKT conditions then give each coordinate as a function of a
//! single multiplier `t`:
//!
//! ```text
//! xᵢ(t) = clamp(aᵢ − t·bᵢ, lᵢ, uᵢ)
//! ```
//!
//! which is piecewise linear with breakpoints `(aᵢ − uᵢ)/bᵢ ≤ (aᵢ − lᵢ)/bᵢ`.
//! The aggregate `g(t) = Σ bᵢ·xᵢ(t)` is continuous and non-increasing, so the
//! root of `g(t) = k` is bracketed by repeatedly evaluating `g` at the median
//! of the breakpoints still inside the bracket. Coordinates whose status no
//! longer changes inside the bracket are folded into running sums and leave
//! the working set, so each pass touches only what is left. Once no breakpoint
//! remains inside the bracket, `g` is linear there and the root is solved for
//! directly.

use crate::Bounds;

#[derive(Debug, Clone, Copy)]
struct Dimension {
    a: f64,
    b: f64,
    lower: f64,
    upper: f64,
    mirrored: bool,
}

impl Dimension {
    fn new(a: f64, b: f64, bounds: Bounds) -> Self {
        if b < 0.0 {
            let bounds = bounds.negated();
            Self {
                a: -a,
                b: -b,
                lower: bounds.lower,
                upper: bounds.upper,
                mirrored: true,
            }
        } else {
            Self {
                a,
                b,
                lower: bounds.lower,
                upper: bounds.upper,
                mirrored: false,
            }
        }
    }

    /// For `t` at or below this, the coordinate sits at its upper bound.
    #[inline]
    fn upper_breakpoint(&self) -> f64 {
        (self.a - self.upper) / self.b
    }

    /// For `t` at or above this, the coordinate sits at its lower bound.
    #[inline]
    fn lower_breakpoint(&self) -> f64 {
        (self.a - self.lower) / self.b
    }

    #[inline]
    fn at(&self, t: f64) -> f64 {
        let v = self.a - t * self.b;
        if v < self.lower {
            self.lower
        } else if v > self.upper {
            self.upper
        } else {
            v
        }
    }

    #[inline]
    fn unmirror(&self, v: f64) -> f64 {
        if self.mirrored {
            -v
        } else {
            v
        }
    }
}

/// Contributions of coordinates whose status is settled inside the bracket.
#[derive(Debug, Default, Clone, Copy)]
struct Settled {
    /// `Σ bᵢ·boundᵢ` over pinned coordinates.
    pinned: f64,
    /// `Σ aᵢ·bᵢ` over free coordinates.
    free_ab: f64,
    /// `Σ bᵢ²` over free coordinates.
    free_bb: f64,
}

/// Reusable projection workspace.
///
/// Holding on to a `Projector` avoids reallocating its scratch buffers when
/// projecting many times in a loop.
#[derive(Debug, Default, Clone)]
pub struct Projector {
    dims: Vec<Dimension>,
    remaining: Vec<usize>,
    breakpoints: Vec<f64>,
}

impl Projector {
    /// Create an empty workspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Project `a` onto `{x : bᵀx = k, x ∈ bounds}` and write the result to `out`.
    ///
    /// The feasible set must be non-empty. Infeasible inputs produce the point
    /// of the box whose `bᵀx` is closest to `k` along the search path.
    pub fn project_onto_hyperplane(
        &mut self,
        a: &[f64],
        b: &[f64],
        bounds: &[Bounds],
        k: f64,
        out: &mut [f64],
    ) {
        debug_assert_eq!(a.len(), b.len());
        debug_assert_eq!(a.len(), bounds.len());
        debug_assert_eq!(a.len(), out.len());
        debug_assert!(
            b.iter().all(|c| *c != 0.0),
            "zero coefficient in knapsack constraint"
        );

        match a.len() {
            0 => {}
            1 => out[0] = bounds[0].clamp(k / b[0]),
            _ => {
                self.dims.clear();
                self.dims.extend(
                    a.iter()
                        .zip(b)
                        .zip(bounds)
                        .map(|((&a, &b), &bounds)| Dimension::new(a, b, bounds)),
                );

                let t = self.solve_multiplier(k);
                for (dim, x) in self.dims.iter().zip(out.iter_mut()) {
                    *x = dim.unmirror(dim.at(t));
                }
            }
        }
    }

    /// Project `a` onto `{x : bᵀx ≤ k, x ∈ bounds}` and write the result to `out`.
    ///
    /// The box projection of `a` is kept when it already satisfies the
    /// inequality; otherwise the constraint is active and the equality
    /// projection is used. For `bᵀx ≥ k` pass `−b` and `−k`.
    pub fn project_onto_halfspace(
        &mut self,
        a: &[f64],
        b: &[f64],
        bounds: &[Bounds],
        k: f64,
        out: &mut [f64],
    ) {
        debug_assert_eq!(a.len(), out.len());

        let mut total = 0.0;
        for i in 0..a.len() {
            out[i] = bounds[i].clamp(a[i]);
            total += b[i] * out[i];
        }

        if total > k {
            self.project_onto_hyperplane(a, b, bounds, k, out);
        }
    }

    /// Find `t` with `g(t) = k`.
    fn solve_multiplier(&mut self, k: f64) -> f64 {
        let mut lo = f64::NEG_INFINITY;
        let mut hi = f64::INFINITY;
        let mut settled = Settled::default();

        self.remaining.clear();
        self.remaining.extend(0..self.dims.len());

        loop {
            let dims = &self.dims;
            self.remaining.retain(|&i| {
                let d = &dims[i];
                let tu = d.upper_breakpoint();
                let tl = d.lower_breakpoint();
                if tl <= lo {
                    settled.pinned += d.b * d.lower;
                    false
                } else if tu >= hi {
                    settled.pinned += d.b * d.upper;
                    false
                } else if tu <= lo && tl >= hi {
                    settled.free_ab += d.a * d.b;
                    settled.free_bb += d.b * d.b;
                    false
                } else {
                    true
                }
            });

            if self.remaining.is_empty() {
                break;
            }

            self.breakpoints.clear();
            for &i in &self.remaining {
                let d = &dims[i];
                for t in [d.upper_breakpoint(), d.lower_breakpoint()] {
                    if lo < t && t < hi {
                        self.breakpoints.push(t);
                    }
                }
            }

            let mid = self.breakpoints.len() / 2;
            let (_, median, _) = self
                .breakpoints
                .select_nth_unstable_by(mid, |x, y| x.total_cmp(y));
            let t = *median;

            let g = settled.pinned + settled.free_ab - t * settled.free_bb
                + self
                    .remaining
                    .iter()
                    .map(|&i| dims[i].b * dims[i].at(t))
                    .sum::<f64>();

            if g == k {
                return t;
            }
            if g > k {
                lo = t;
            } else {
                hi = t;
            }
        }

        // No breakpoint left inside (lo, hi): g is linear on the bracket.
        if settled.free_bb > 0.0 {
            let t = (settled.pinned + settled.free_ab - k) / settled.free_bb;
            t.max(lo).min(hi)
        } else if lo.is_finite() {
            lo
        } else if hi.is_finite() {
            hi
        } else {
            0.0
        }
    }
}

/// Project `a` onto `{x : bᵀx = k, x ∈ bounds}` using a fresh workspace.
pub fn project_onto_hyperplane(a: &[f64], b: &[f64], bounds: &[Bounds], k: f64, out: &mut [f64]) {
    Projector::new().project_onto_hyperplane(a, b, bounds, k, out);
}

/// Project `a` onto `{x : bᵀx ≤ k, x ∈ bounds}` using a fresh workspace.
pub fn project_onto_halfspace(a: &[f64], b: &[f64], bounds: &[Bounds], k: f64, out: &mut [f64]) {
    Projector::new().project_onto_halfspace(a, b, bounds, k, out);
}
