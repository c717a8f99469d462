//! Concord Model
//!
//! The data the reasoner consumes from its external collaborators.
//!
//! # Atoms
//!
//! An atom is a ground predicate application with a continuous truth value.
//! Atoms are owned by an [`AtomStore`]: the reasoner reads their current
//! values when it builds a round and commits the settled values when the
//! round ends. Stores never learn which rules reference an atom.
//!
//! # Grounded Rules
//!
//! The grounding layer instantiates first-order rules (templates) into
//! [`GroundRule`]s. A rule is either weighted, contributing a non-negative
//! penalty scaled by its template's learned weight, or a hard constraint.
//! Both are expressed as a [`FunctionTerm`] over atoms:
//!
//! ```text
//! weighted:    w · max(Σ cᵢ·xᵢ − k, 0)      (optionally squared)
//! weighted:    w · Σ cᵢ·xᵢ                  (optionally squared)
//! constraint:  Σ cᵢ·xᵢ  ⋈  k               ⋈ ∈ {=, ≤, ≥}
//! ```

mod atom;
mod function;
mod rule;

pub use atom::{AtomId, AtomKind, AtomStore, MemoryAtomStore};
pub use function::{FunctionTerm, Singleton, Summand};
pub use rule::{
    Comparator, ConstraintTerm, GroundRule, GroundRuleId, RuleBody, RuleTemplate, TemplateId,
    TemplateKind, CONSTRAINT_TOLERANCE,
};
