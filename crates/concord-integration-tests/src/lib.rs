//! Fixtures for the end-to-end scenarios under `tests/`.
//!
//! A [`Scenario`] owns an atom store and a list of templates and rules, and
//! hands out a fresh [`Reasoner`] per configuration so one model can be
//! solved under several step sizes.

use concord_admm::{Reasoner, ReasonerConfig, Result};
use concord_model::{
    AtomId, Comparator, ConstraintTerm, FunctionTerm, GroundRule, GroundRuleId, MemoryAtomStore,
    RuleTemplate, Summand, TemplateId,
};

/// Step sizes the convergence scenarios sweep over.
pub const STEP_SIZES: [f64; 4] = [0.01, 0.1, 1.0, 10.0];

/// Install the test subscriber. `RUST_LOG` overrides the default.
pub fn logging() {
    concord_logging::try_init("concord_admm=debug");
}

/// A model to solve.
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    pub atoms: MemoryAtomStore,
    pub templates: Vec<RuleTemplate>,
    pub rules: Vec<GroundRule>,
}

impl Scenario {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a random atom at `value`.
    pub fn atom(&mut self, id: u64, value: f64) -> AtomId {
        let atom = AtomId(id);
        self.atoms.insert_random(atom, value);
        atom
    }

    /// Add an observed atom fixed at `value`.
    pub fn evidence(&mut self, id: u64, value: f64) -> AtomId {
        let atom = AtomId(id);
        self.atoms.insert_observed(atom, value);
        atom
    }

    /// Register a weighted template.
    pub fn weighted(&mut self, id: u32, weight: f64) -> TemplateId {
        let template = TemplateId(id);
        self.templates
            .push(RuleTemplate::weighted(template, format!("weighted-{}", id), weight));
        template
    }

    /// Register a constraint template.
    pub fn constraint(&mut self, id: u32) -> TemplateId {
        let template = TemplateId(id);
        self.templates
            .push(RuleTemplate::constraint(template, format!("constraint-{}", id)));
        template
    }

    /// `max(Σ cᵢ·xᵢ − k, 0)`
    pub fn hinge(&mut self, template: TemplateId, terms: &[(f64, AtomId)], k: f64) -> GroundRuleId {
        self.push_weighted(template, FunctionTerm::hinge(linear(terms, k)))
    }

    /// `max(Σ cᵢ·xᵢ − k, 0)²`
    pub fn squared_hinge(
        &mut self,
        template: TemplateId,
        terms: &[(f64, AtomId)],
        k: f64,
    ) -> GroundRuleId {
        self.push_weighted(template, FunctionTerm::hinge(linear(terms, k)).squared())
    }

    /// `(Σ cᵢ·xᵢ − k)²`
    pub fn squared(
        &mut self,
        template: TemplateId,
        terms: &[(f64, AtomId)],
        k: f64,
    ) -> GroundRuleId {
        self.push_weighted(template, FunctionTerm::sum(linear(terms, k)).squared())
    }

    /// `Σ cᵢ·xᵢ ⋈ value`
    pub fn linear_constraint(
        &mut self,
        template: TemplateId,
        terms: &[(f64, AtomId)],
        comparator: Comparator,
        value: f64,
    ) -> GroundRuleId {
        let id = self.next_id();
        self.rules.push(GroundRule::constraint(
            id,
            template,
            ConstraintTerm::new(FunctionTerm::sum(linear(terms, 0.0)), comparator, value),
        ));
        id
    }

    /// Build a reasoner holding every template and rule.
    pub fn reasoner(&self, config: ReasonerConfig) -> Result<Reasoner<MemoryAtomStore>> {
        let mut reasoner = Reasoner::new(config, self.atoms.clone())?;
        for template in &self.templates {
            reasoner.register_template(template.clone())?;
        }
        for rule in &self.rules {
            reasoner.add_grounded_rule(rule.clone())?;
        }
        Ok(reasoner)
    }

    fn push_weighted(&mut self, template: TemplateId, function: FunctionTerm) -> GroundRuleId {
        let id = self.next_id();
        self.rules
            .push(GroundRule::weighted(id, template, function));
        id
    }

    fn next_id(&self) -> GroundRuleId {
        GroundRuleId(self.rules.len() as u64)
    }
}

fn linear(terms: &[(f64, AtomId)], k: f64) -> Vec<Summand> {
    let mut summands: Vec<Summand> = terms
        .iter()
        .map(|&(c, atom)| Summand::atom(c, atom))
        .collect();
    if k != 0.0 {
        summands.push(Summand::constant(-k));
    }
    summands
}

/// A tightly converging configuration at step size `rho`.
pub fn tight(rho: f64) -> ReasonerConfig {
    ReasonerConfig::sequential()
        .with_step_size(rho)
        .with_residual_tolerance(1e-6)
        .with_max_iterations(1_000_000)
}
