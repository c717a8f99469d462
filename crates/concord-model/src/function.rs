//! Function terms over atoms.
//!
//! Grounding produces rule bodies as small expression trees. The reasoner only
//! optimizes the linear and piecewise-linear shapes, but every shape can be
//! evaluated so incompatibilities are always available.

use crate::atom::{AtomId, AtomStore};

/// A leaf of a linear sum.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Singleton {
    /// Reference to an atom's value.
    Atom(AtomId),
    /// A constant number.
    Constant(f64),
}

impl Singleton {
    /// Evaluate against an atom store.
    pub fn value<S: AtomStore + ?Sized>(&self, atoms: &S) -> f64 {
        match self {
            Singleton::Atom(id) => atoms.value(*id),
            Singleton::Constant(v) => *v,
        }
    }
}

/// `coefficient · singleton`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Summand {
    pub coefficient: f64,
    pub singleton: Singleton,
}

impl Summand {
    /// `coefficient · atom`
    pub const fn atom(coefficient: f64, atom: AtomId) -> Self {
        Self {
            coefficient,
            singleton: Singleton::Atom(atom),
        }
    }

    /// A constant offset.
    pub const fn constant(value: f64) -> Self {
        Self {
            coefficient: 1.0,
            singleton: Singleton::Constant(value),
        }
    }

    /// Evaluate against an atom store.
    pub fn value<S: AtomStore + ?Sized>(&self, atoms: &S) -> f64 {
        self.coefficient * self.singleton.value(atoms)
    }
}

/// A grounded function of atoms.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FunctionTerm {
    /// A constant.
    Constant(f64),
    /// Linear sum `Σ cᵢ·sᵢ`.
    Sum(Vec<Summand>),
    /// Pointwise maximum of the arguments.
    Max(Vec<FunctionTerm>),
    /// The argument squared.
    Square(Box<FunctionTerm>),
    /// Product of the arguments. Evaluable, but not a convex shape.
    Product(Vec<FunctionTerm>),
}

impl FunctionTerm {
    /// Linear sum of summands.
    pub fn sum(summands: Vec<Summand>) -> Self {
        FunctionTerm::Sum(summands)
    }

    /// `max(Σ summands, 0)`
    pub fn hinge(summands: Vec<Summand>) -> Self {
        FunctionTerm::Max(vec![FunctionTerm::Sum(summands), FunctionTerm::Constant(0.0)])
    }

    /// Wrap this function in a square.
    pub fn squared(self) -> Self {
        FunctionTerm::Square(Box::new(self))
    }

    /// Evaluate against an atom store.
    pub fn value<S: AtomStore + ?Sized>(&self, atoms: &S) -> f64 {
        match self {
            FunctionTerm::Constant(v) => *v,
            FunctionTerm::Sum(summands) => summands.iter().map(|s| s.value(atoms)).sum(),
            FunctionTerm::Max(args) => args
                .iter()
                .map(|f| f.value(atoms))
                .fold(f64::NEG_INFINITY, f64::max),
            FunctionTerm::Square(inner) => {
                let v = inner.value(atoms);
                v * v
            }
            FunctionTerm::Product(args) => args.iter().map(|f| f.value(atoms)).product(),
        }
    }

    /// Whether the function is linear in its atoms.
    pub fn is_linear(&self) -> bool {
        matches!(self, FunctionTerm::Constant(_) | FunctionTerm::Sum(_))
    }

    /// Atoms referenced by this function, in first-occurrence order, without duplicates.
    pub fn atoms(&self) -> Vec<AtomId> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms(&self, out: &mut Vec<AtomId>) {
        match self {
            FunctionTerm::Constant(_) => {}
            FunctionTerm::Sum(summands) => {
                for summand in summands {
                    if let Singleton::Atom(id) = summand.singleton {
                        if !out.contains(&id) {
                            out.push(id);
                        }
                    }
                }
            }
            FunctionTerm::Max(args) | FunctionTerm::Product(args) => {
                for arg in args {
                    arg.collect_atoms(out);
                }
            }
            FunctionTerm::Square(inner) => inner.collect_atoms(out),
        }
    }
}

impl std::fmt::Display for FunctionTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionTerm::Constant(v) => write!(f, "{}", v),
            FunctionTerm::Sum(summands) => {
                if summands.is_empty() {
                    return write!(f, "0");
                }
                for (i, s) in summands.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    match s.singleton {
                        Singleton::Atom(id) => write!(f, "{}*{}", s.coefficient, id)?,
                        Singleton::Constant(v) => write!(f, "{}", s.coefficient * v)?,
                    }
                }
                Ok(())
            }
            FunctionTerm::Max(args) => write_args(f, "max", args),
            FunctionTerm::Square(inner) => write!(f, "({})^2", inner),
            FunctionTerm::Product(args) => write_args(f, "product", args),
        }
    }
}

fn write_args(
    f: &mut std::fmt::Formatter<'_>,
    name: &str,
    args: &[FunctionTerm],
) -> std::fmt::Result {
    write!(f, "{}(", name)?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", arg)?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::MemoryAtomStore;

    fn store() -> MemoryAtomStore {
        let mut store = MemoryAtomStore::new();
        store.insert_random(AtomId(1), 0.25);
        store.insert_random(AtomId(2), 0.75);
        store
    }

    #[test]
    fn sum_value() {
        let f = FunctionTerm::sum(vec![
            Summand::atom(2.0, AtomId(1)),
            Summand::atom(-1.0, AtomId(2)),
            Summand::constant(0.5),
        ]);
        assert!((f.value(&store()) - 0.25).abs() < 1e-12);
        assert!(f.is_linear());
    }

    #[test]
    fn hinge_clips_at_zero() {
        let f = FunctionTerm::hinge(vec![Summand::atom(1.0, AtomId(1)), Summand::constant(-0.5)]);
        assert_eq!(f.value(&store()), 0.0);
        assert!(!f.is_linear());

        let g = FunctionTerm::hinge(vec![Summand::atom(1.0, AtomId(2)), Summand::constant(-0.5)]);
        assert!((g.value(&store()) - 0.25).abs() < 1e-12);
        assert!((g.squared().value(&store()) - 0.0625).abs() < 1e-12);
    }

    #[test]
    fn atoms_are_distinct_and_ordered() {
        let f = FunctionTerm::Max(vec![
            FunctionTerm::sum(vec![
                Summand::atom(1.0, AtomId(2)),
                Summand::atom(1.0, AtomId(1)),
                Summand::atom(3.0, AtomId(2)),
            ]),
            FunctionTerm::Constant(0.0),
        ]);
        assert_eq!(f.atoms(), vec![AtomId(2), AtomId(1)]);
    }

    #[test]
    fn product_evaluates() {
        let f = FunctionTerm::Product(vec![
            FunctionTerm::sum(vec![Summand::atom(1.0, AtomId(1))]),
            FunctionTerm::sum(vec![Summand::atom(1.0, AtomId(2))]),
        ]);
        assert!((f.value(&store()) - 0.1875).abs() < 1e-12);
    }

    #[test]
    fn display() {
        let f = FunctionTerm::hinge(vec![Summand::atom(1.0, AtomId(4)), Summand::constant(-0.3)]);
        assert_eq!(f.to_string(), "max(1*atom#4 + -0.3, 0)");
    }
}
