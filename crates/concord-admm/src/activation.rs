//! Activation of lazy atoms between rounds.
//!
//! Some atoms only matter once their value becomes non-trivial. Rather than
//! grounding every rule over them up front, the grounding layer hands them
//! to an [`ActivationPolicy`] as candidates. After each round the policy
//! looks at the committed values, activates the candidates that crossed its
//! threshold and returns the rules the activation exposes.

use std::collections::BTreeSet;

use concord_model::{AtomId, AtomStore, GroundRule};

use crate::error::{Error, Result};

/// Default activation threshold.
pub const DEFAULT_ACTIVATION_THRESHOLD: f64 = 0.01;

/// Atoms activated after a round and the rules they expose.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Activation {
    pub activated: Vec<AtomId>,
    pub rules: Vec<GroundRule>,
}

impl Activation {
    /// Nothing activated.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether no atom was activated.
    pub fn is_empty(&self) -> bool {
        self.activated.is_empty()
    }
}

/// Decides between rounds which atoms to activate.
pub trait ActivationPolicy {
    /// Inspect the committed atom values. An empty `activated` list ends
    /// the outer loop.
    fn activate(&mut self, atoms: &dyn AtomStore) -> Activation;

    /// Whether the policy can never activate anything again.
    fn is_idle(&self) -> bool {
        false
    }
}

/// Produces the rules exposed by newly activated atoms.
pub trait Grounder {
    fn ground(&mut self, activated: &[AtomId]) -> Vec<GroundRule>;
}

impl<F> Grounder for F
where
    F: FnMut(&[AtomId]) -> Vec<GroundRule>,
{
    fn ground(&mut self, activated: &[AtomId]) -> Vec<GroundRule> {
        self(activated)
    }
}

/// Never activates anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoActivation;

impl ActivationPolicy for NoActivation {
    fn activate(&mut self, _atoms: &dyn AtomStore) -> Activation {
        Activation::none()
    }

    fn is_idle(&self) -> bool {
        true
    }
}

/// Activates candidates whose value reaches a threshold.
#[derive(Debug, Clone)]
pub struct ThresholdActivation<G> {
    grounder: G,
    threshold: f64,
    candidates: BTreeSet<AtomId>,
}

impl<G: Grounder> ThresholdActivation<G> {
    /// Policy with the default threshold and no candidates.
    pub fn new(grounder: G) -> Self {
        Self {
            grounder,
            threshold: DEFAULT_ACTIVATION_THRESHOLD,
            candidates: BTreeSet::new(),
        }
    }

    /// Set the threshold, which must lie in `(0, 1]`.
    pub fn with_threshold(mut self, threshold: f64) -> Result<Self> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(Error::InvalidConfig {
                key: "activation_threshold",
                reason: format!("must lie in (0, 1], got {}", threshold),
            });
        }
        self.threshold = threshold;
        Ok(self)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Track `atom` as a lazy candidate.
    pub fn add_candidate(&mut self, atom: AtomId) -> bool {
        self.candidates.insert(atom)
    }

    pub fn extend_candidates(&mut self, atoms: impl IntoIterator<Item = AtomId>) {
        self.candidates.extend(atoms);
    }

    /// Candidates not yet activated, in id order.
    pub fn candidates(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.candidates.iter().copied()
    }
}

impl<G: Grounder> ActivationPolicy for ThresholdActivation<G> {
    fn activate(&mut self, atoms: &dyn AtomStore) -> Activation {
        let threshold = self.threshold;
        let activated: Vec<AtomId> = self
            .candidates
            .iter()
            .copied()
            .filter(|atom| atoms.value(*atom) >= threshold)
            .collect();

        if activated.is_empty() {
            return Activation::none();
        }

        for atom in &activated {
            self.candidates.remove(atom);
        }
        let rules = self.grounder.ground(&activated);
        Activation { activated, rules }
    }

    fn is_idle(&self) -> bool {
        self.candidates.is_empty()
    }
}
