//! Compilation of grounded rules into term shapes.
//!
//! A rule's shape is checked once, when the rule is added. Building the
//! round's terms then only folds observed atoms and resolves slots.

use concord_knapsack::Bounds;
use concord_model::{
    AtomId, AtomStore, Comparator, FunctionTerm, GroundRule, RuleBody, Singleton, Summand,
    CONSTRAINT_TOLERANCE,
};
use tracing::debug;

use crate::cholesky::FactorCache;
use crate::error::{Error, Result};
use crate::registry::ConsensusRegistry;
use crate::term::{ObjectiveTerm, QuadraticSolve, TermKind};

/// The optimizable shape of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermShape {
    /// `w·(cᵀx − k)`
    LinearLoss,
    /// `w·(cᵀx − k)²`
    SquaredHyperplane,
    /// `w·max(cᵀx − k, 0)`
    Hinge,
    /// `w·max(cᵀx − k, 0)²`
    SquaredHinge,
    /// `cᵀx ⋈ k`
    LinearConstraint(Comparator),
}

/// `Σ cᵢ·xᵢ` against a right-hand side `k`.
///
/// Atoms are distinct and every coefficient is non-zero.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearForm {
    pub variables: Vec<(AtomId, f64)>,
    pub k: f64,
}

impl LinearForm {
    /// Collect `Σ summands` as `cᵀx − k`, merging repeated atoms.
    fn from_summands(summands: &[Summand]) -> Self {
        let mut variables: Vec<(AtomId, f64)> = Vec::with_capacity(summands.len());
        let mut constant = 0.0;

        for summand in summands {
            match summand.singleton {
                Singleton::Constant(v) => constant += summand.coefficient * v,
                Singleton::Atom(atom) => {
                    match variables.iter_mut().find(|(id, _)| *id == atom) {
                        Some((_, c)) => *c += summand.coefficient,
                        None => variables.push((atom, summand.coefficient)),
                    }
                }
            }
        }
        variables.retain(|(_, c)| *c != 0.0);

        Self {
            variables,
            k: -constant,
        }
    }
}

/// A rule whose shape has been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub shape: TermShape,
    pub form: LinearForm,
}

/// Check a rule's shape and extract its linear form.
pub fn compile(rule: &GroundRule) -> Result<CompiledRule> {
    match &rule.body {
        RuleBody::Weighted(function) => compile_weighted(rule, function, false),
        RuleBody::Constraint(constraint) => match &constraint.function {
            FunctionTerm::Sum(summands) => {
                let mut form = LinearForm::from_summands(summands);
                // Σ cᵢxᵢ + b ⋈ v  ⇔  Σ cᵢxᵢ ⋈ v − b
                form.k += constraint.value;
                Ok(CompiledRule {
                    shape: TermShape::LinearConstraint(constraint.comparator),
                    form,
                })
            }
            other => Err(Error::malformed(
                rule,
                format!("constraint function must be a linear sum, got {}", other),
            )),
        },
    }
}

fn compile_weighted(
    rule: &GroundRule,
    function: &FunctionTerm,
    squared: bool,
) -> Result<CompiledRule> {
    match function {
        FunctionTerm::Square(inner) if !squared => compile_weighted(rule, inner, true),
        FunctionTerm::Square(_) => Err(Error::malformed(rule, "nested square")),
        FunctionTerm::Sum(summands) => Ok(CompiledRule {
            shape: if squared {
                TermShape::SquaredHyperplane
            } else {
                TermShape::LinearLoss
            },
            form: LinearForm::from_summands(summands),
        }),
        FunctionTerm::Max(args) => {
            let summands = hinge_argument(args).ok_or_else(|| {
                Error::malformed(rule, "max must pair a linear sum with the constant 0")
            })?;
            Ok(CompiledRule {
                shape: if squared {
                    TermShape::SquaredHinge
                } else {
                    TermShape::Hinge
                },
                form: LinearForm::from_summands(summands),
            })
        }
        FunctionTerm::Constant(_) => {
            Err(Error::malformed(rule, "constant function has no variables"))
        }
        FunctionTerm::Product(_) => Err(Error::malformed(rule, "products are not convex")),
    }
}

/// The sum inside `max(sum, 0)` or `max(0, sum)`.
fn hinge_argument(args: &[FunctionTerm]) -> Option<&[Summand]> {
    let is_zero = |f: &FunctionTerm| matches!(f, FunctionTerm::Constant(v) if *v == 0.0);
    match args {
        [FunctionTerm::Sum(summands), zero] | [zero, FunctionTerm::Sum(summands)]
            if is_zero(zero) =>
        {
            Some(summands.as_slice())
        }
        _ => None,
    }
}

impl CompiledRule {
    /// Build this round's term.
    ///
    /// Observed atoms are folded into `k` at their current value. Returns
    /// `None` when no variable remains.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn instantiate<S: AtomStore + ?Sized>(
        &self,
        rule: &GroundRule,
        weight: f64,
        atoms: &S,
        term_index: usize,
        registry: &mut ConsensusRegistry,
        cache: &mut FactorCache,
        step_size: f64,
    ) -> Result<Option<ObjectiveTerm>> {
        let mut k = self.form.k;
        let mut variables = Vec::with_capacity(self.form.variables.len());
        for &(atom, coefficient) in &self.form.variables {
            let kind = atoms.kind(atom);
            if kind.is_variable() {
                variables.push((atom, coefficient, kind));
            } else {
                k -= coefficient * atoms.value(atom);
            }
        }

        if variables.is_empty() {
            if let TermShape::LinearConstraint(comparator) = self.shape {
                if !comparator.holds(0.0, k, CONSTRAINT_TOLERANCE) {
                    debug!(
                        "Constraint {} over observed atoms only is violated",
                        rule.id
                    );
                }
            }
            return Ok(None);
        }

        let coefficients: Vec<f64> = variables.iter().map(|(_, c, _)| *c).collect();
        let mut bounds = Vec::with_capacity(variables.len());
        let mut slots = Vec::with_capacity(variables.len());
        for (local, &(atom, _, kind)) in variables.iter().enumerate() {
            let (lower, upper) = kind.bounds();
            let bound = Bounds::new(lower, upper);
            let slot = registry.resolve(term_index, atom, local, atoms.value(atom), bound);
            slots.push(slot);
            bounds.push(bound);
        }

        let kind = match self.shape {
            TermShape::LinearLoss => TermKind::LinearLoss { weight },
            TermShape::Hinge => TermKind::Hinge { weight },
            TermShape::SquaredHinge => TermKind::SquaredHinge {
                weight,
                solve: QuadraticSolve::new(&coefficients, weight, step_size, cache)?,
            },
            TermShape::SquaredHyperplane => TermKind::SquaredHyperplane {
                weight,
                solve: QuadraticSolve::new(&coefficients, weight, step_size, cache)?,
            },
            TermShape::LinearConstraint(comparator) => TermKind::LinearConstraint { comparator },
        };

        Ok(Some(ObjectiveTerm::new(
            rule.id,
            kind,
            coefficients,
            k,
            bounds,
            slots,
            registry.values(),
        )))
    }
}
