//! # Concord ADMM
//!
//! MAP inference over grounded weighted rules by consensus ADMM.
//!
//! Every grounded rule becomes an objective term holding local copies of the
//! atoms it references. Terms agree on a shared value per atom (the
//! consensus) only through dual variables, so each term's subproblem is
//! solved on its own:
//!
//! ```text
//! minimize   Σ_r w_r·f_r(x_r)
//! subject to x_r[i] = z[atom(r, i)]   for every term r and local i
//!            constraints hold,        0 ≤ z ≤ 1
//! ```
//!
//! # Usage
//!
//! ```
//! use concord_admm::{Reasoner, ReasonerConfig};
//! use concord_model::{
//!     AtomId, AtomStore, FunctionTerm, GroundRule, GroundRuleId, MemoryAtomStore, RuleTemplate,
//!     Summand, TemplateId,
//! };
//!
//! let x = AtomId(1);
//! let mut atoms = MemoryAtomStore::new();
//! atoms.insert_random(x, 0.5);
//!
//! let config = ReasonerConfig::default().with_step_size(1.0);
//! let mut reasoner = Reasoner::new(config, atoms)?;
//! reasoner.register_template(RuleTemplate::weighted(TemplateId(0), "cap", 1.0))?;
//! // max(x − 0.3, 0)
//! reasoner.add_grounded_rule(GroundRule::weighted(
//!     GroundRuleId(0),
//!     TemplateId(0),
//!     FunctionTerm::hinge(vec![Summand::atom(1.0, x), Summand::constant(-0.3)]),
//! ))?;
//!
//! let summary = reasoner.optimize()?;
//! assert!(summary.converged);
//! assert!((reasoner.atoms().value(x) - 0.3).abs() < 1e-2);
//! # Ok::<(), concord_admm::Error>(())
//! ```
//!
//! # Parallelism
//!
//! The three phases of an iteration are each a rayon pass over a disjoint
//! arena: terms in the minimization and dual phases, consensus slots in the
//! mean update. Small problems run sequentially, see
//! [`ReasonerConfig::min_terms_for_parallel`]. Set
//! [`ReasonerConfig::num_threads`] to run them on a pool owned by the
//! reasoner rather than rayon's global one.

mod activation;
mod cholesky;
mod compile;
mod config;
mod error;
mod reasoner;
mod registry;
mod summary;
mod term;

pub use activation::{
    Activation, ActivationPolicy, Grounder, NoActivation, ThresholdActivation,
    DEFAULT_ACTIVATION_THRESHOLD,
};
pub use cholesky::{CholeskyFactor, FactorCache};
pub use compile::{compile, CompiledRule, LinearForm, TermShape};
pub use config::ReasonerConfig;
pub use error::{Error, Result};
pub use reasoner::Reasoner;
pub use registry::{ConsensusRegistry, MeanUpdate, VariableLocation};
pub use summary::{InferenceSummary, RoundSummary};
pub use term::{ObjectiveTerm, QuadraticSolve, TermKind, Workspace};
