//! Grounded rules and the templates they are instantiated from.

use crate::atom::{AtomId, AtomStore};
use crate::function::FunctionTerm;

/// Tolerance used when checking whether a constraint holds.
pub const CONSTRAINT_TOLERANCE: f64 = 1e-6;

/// Identity of a first-order rule (template).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TemplateId(pub u32);

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "template#{}", self.0)
    }
}

/// Identity of a grounded rule, assigned by the grounding layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroundRuleId(pub u64);

impl std::fmt::Display for GroundRuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rule#{}", self.0)
    }
}

/// Whether a template yields weighted rules or constraints.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TemplateKind {
    /// Compatibility rule with a learned non-negative weight.
    Weighted { weight: f64 },
    /// Hard constraint.
    Constraint,
}

/// A first-order rule as known to the reasoner.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleTemplate {
    pub id: TemplateId,
    pub name: String,
    pub kind: TemplateKind,
}

impl RuleTemplate {
    /// A weighted template.
    pub fn weighted(id: TemplateId, name: impl Into<String>, weight: f64) -> Self {
        Self {
            id,
            name: name.into(),
            kind: TemplateKind::Weighted { weight },
        }
    }

    /// A constraint template.
    pub fn constraint(id: TemplateId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: TemplateKind::Constraint,
        }
    }

    /// Weight of a weighted template.
    pub fn weight(&self) -> Option<f64> {
        match self.kind {
            TemplateKind::Weighted { weight } => Some(weight),
            TemplateKind::Constraint => None,
        }
    }

    /// Whether groundings of this template are constraints.
    pub fn is_constraint(&self) -> bool {
        matches!(self.kind, TemplateKind::Constraint)
    }
}

/// Comparison operator of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Comparator {
    /// `=`
    Eq,
    /// `≤`
    Lte,
    /// `≥`
    Gte,
}

impl Comparator {
    /// Whether `lhs ⋈ rhs` holds within `tolerance`.
    pub fn holds(&self, lhs: f64, rhs: f64, tolerance: f64) -> bool {
        match self {
            Comparator::Eq => (lhs - rhs).abs() <= tolerance,
            Comparator::Lte => lhs <= rhs + tolerance,
            Comparator::Gte => lhs >= rhs - tolerance,
        }
    }

    /// Amount by which `lhs ⋈ rhs` is violated (0 when it holds).
    pub fn violation(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Comparator::Eq => (lhs - rhs).abs(),
            Comparator::Lte => (lhs - rhs).max(0.0),
            Comparator::Gte => (rhs - lhs).max(0.0),
        }
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Comparator::Eq => write!(f, "="),
            Comparator::Lte => write!(f, "<="),
            Comparator::Gte => write!(f, ">="),
        }
    }
}

/// `function ⋈ value`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstraintTerm {
    pub function: FunctionTerm,
    pub comparator: Comparator,
    pub value: f64,
}

impl ConstraintTerm {
    pub fn new(function: FunctionTerm, comparator: Comparator, value: f64) -> Self {
        Self {
            function,
            comparator,
            value,
        }
    }

    /// How far the current assignment is from satisfying the constraint.
    pub fn infeasibility<S: AtomStore + ?Sized>(&self, atoms: &S) -> f64 {
        self.comparator
            .violation(self.function.value(atoms), self.value)
    }

    /// Whether the constraint holds within [`CONSTRAINT_TOLERANCE`].
    pub fn is_satisfied<S: AtomStore + ?Sized>(&self, atoms: &S) -> bool {
        self.comparator
            .holds(self.function.value(atoms), self.value, CONSTRAINT_TOLERANCE)
    }
}

/// The body of a grounded rule.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RuleBody {
    /// Incompatibility function of a compatibility rule.
    Weighted(FunctionTerm),
    /// A hard constraint.
    Constraint(ConstraintTerm),
}

/// One fully-instantiated rule.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroundRule {
    pub id: GroundRuleId,
    pub template: TemplateId,
    pub body: RuleBody,
}

impl GroundRule {
    /// A weighted grounding.
    pub fn weighted(id: GroundRuleId, template: TemplateId, function: FunctionTerm) -> Self {
        Self {
            id,
            template,
            body: RuleBody::Weighted(function),
        }
    }

    /// A constraint grounding.
    pub fn constraint(id: GroundRuleId, template: TemplateId, constraint: ConstraintTerm) -> Self {
        Self {
            id,
            template,
            body: RuleBody::Constraint(constraint),
        }
    }

    /// Whether this rule is a hard constraint.
    pub fn is_constraint(&self) -> bool {
        matches!(self.body, RuleBody::Constraint(_))
    }

    /// The rule's function (for constraints, the left-hand side).
    pub fn function(&self) -> &FunctionTerm {
        match &self.body {
            RuleBody::Weighted(f) => f,
            RuleBody::Constraint(c) => &c.function,
        }
    }

    /// Atoms referenced by the rule, ordered and distinct.
    pub fn atoms(&self) -> Vec<AtomId> {
        self.function().atoms()
    }

    /// Penalty at the current assignment.
    ///
    /// Weighted rules report their unweighted function value. Constraints
    /// report `0` when satisfied and `+∞` otherwise.
    pub fn incompatibility<S: AtomStore + ?Sized>(&self, atoms: &S) -> f64 {
        match &self.body {
            RuleBody::Weighted(f) => f.value(atoms),
            RuleBody::Constraint(c) => {
                if c.is_satisfied(atoms) {
                    0.0
                } else {
                    f64::INFINITY
                }
            }
        }
    }
}

impl std::fmt::Display for GroundRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.body {
            RuleBody::Weighted(func) => write!(f, "{} [{}]: {}", self.id, self.template, func),
            RuleBody::Constraint(c) => write!(
                f,
                "{} [{}]: {} {} {}",
                self.id, self.template, c.function, c.comparator, c.value
            ),
        }
    }
}
