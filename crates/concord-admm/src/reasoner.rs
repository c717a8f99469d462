//! The consensus ADMM reasoner.
//!
//! # Rounds
//!
//! [`Reasoner::optimize`] runs rounds until the activation policy has
//! nothing left to activate or `max_rounds` is reached. Each round builds one
//! [`ObjectiveTerm`] per grounded rule, runs the inner loop on them, and
//! commits the consensus values to the atom store.
//!
//! # Inner loop
//!
//! ```text
//! repeat
//!     x ← argmin f(x) + ρ/2·‖x − z + y/ρ‖²      per term
//!     z ← mean of local copies                   per slot
//!     y ← y + ρ·(x − z)                          per term
//! until ‖x − z‖ ≤ ε and ‖Δz‖ ≤ ε, or max_iterations
//! ```
//!
//! The stopping test runs every `stop_check` iterations.
//!
//! Terms only read `z` at their own slots and write their own `x`/`y`, and
//! each slot is written only by its own mean update. Every phase is therefore
//! a data-parallel pass over a disjoint arena, and the end of each pass is the
//! only synchronisation needed. With `num_threads` set, the passes run on a
//! pool owned by the reasoner instead of the global one.

use std::collections::HashMap;

use concord_model::{AtomStore, GroundRule, GroundRuleId, RuleTemplate, TemplateId, TemplateKind};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, trace, warn};

use crate::activation::{ActivationPolicy, NoActivation};
use crate::cholesky::FactorCache;
use crate::compile::{compile, CompiledRule};
use crate::config::ReasonerConfig;
use crate::error::{Error, Result};
use crate::registry::{ConsensusRegistry, MeanUpdate};
use crate::summary::{InferenceSummary, RoundSummary};
use crate::term::{ObjectiveTerm, Workspace};

/// Iterations between residual trace lines.
const TRACE_INTERVAL: usize = 50;

#[derive(Debug, Clone)]
struct RuleEntry {
    rule: GroundRule,
    compiled: CompiledRule,
}

/// State of the last round, kept for dual incompatibilities.
#[derive(Debug, Default)]
struct Round {
    terms: Vec<ObjectiveTerm>,
    registry: ConsensusRegistry,
    term_of: HashMap<GroundRuleId, usize>,
}

/// Outcome of one inner loop.
#[derive(Debug)]
struct InnerLoop {
    iterations: usize,
    converged: bool,
    primal: f64,
    dual: f64,
    last: MeanUpdate,
}

/// MAP inference over a set of grounded rules.
pub struct Reasoner<S: AtomStore> {
    config: ReasonerConfig,
    atoms: S,
    templates: HashMap<TemplateId, RuleTemplate>,
    rules: Vec<RuleEntry>,
    positions: HashMap<GroundRuleId, usize>,
    cache: FactorCache,
    activation: Box<dyn ActivationPolicy>,
    pool: Option<ThreadPool>,
    round: Round,
    stale: bool,
}

impl<S: AtomStore> Reasoner<S> {
    /// Create a reasoner over `atoms`.
    pub fn new(config: ReasonerConfig, atoms: S) -> Result<Self> {
        config.validate()?;
        let pool = match config.num_threads {
            Some(threads) => Some(
                ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("concord-admm-{}", i))
                    .build()
                    .map_err(|e| Error::InvalidConfig {
                        key: "num_threads",
                        reason: e.to_string(),
                    })?,
            ),
            None => None,
        };
        Ok(Self {
            config,
            atoms,
            templates: HashMap::new(),
            rules: Vec::new(),
            positions: HashMap::new(),
            cache: FactorCache::new(),
            activation: Box::new(NoActivation),
            pool,
            round: Round::default(),
            stale: true,
        })
    }

    /// Install an activation policy.
    #[must_use]
    pub fn with_activation(mut self, policy: Box<dyn ActivationPolicy>) -> Self {
        self.activation = policy;
        self
    }

    /// Replace the activation policy.
    pub fn set_activation(&mut self, policy: Box<dyn ActivationPolicy>) {
        self.activation = policy;
    }

    // ---- Templates ----

    /// Register the template rules will be grounded from.
    pub fn register_template(&mut self, template: RuleTemplate) -> Result<()> {
        if self.templates.contains_key(&template.id) {
            return Err(Error::DuplicateTemplate(template.id));
        }
        if let Some(weight) = template.weight() {
            check_weight(template.id, weight)?;
        }
        self.templates.insert(template.id, template);
        Ok(())
    }

    /// Change a weighted template's weight.
    ///
    /// Cached factors for the old weight stay until
    /// [`notify_weights_changed`](Self::notify_weights_changed).
    pub fn set_weight(&mut self, template: TemplateId, weight: f64) -> Result<()> {
        check_weight(template, weight)?;
        let entry = self
            .templates
            .get_mut(&template)
            .ok_or(Error::UnknownTemplate(template))?;
        match &mut entry.kind {
            TemplateKind::Weighted { weight: w } => *w = weight,
            TemplateKind::Constraint => return Err(Error::NotWeighted(template)),
        }
        self.stale = true;
        Ok(())
    }

    /// Weight of a weighted template.
    pub fn weight(&self, template: TemplateId) -> Option<f64> {
        self.templates.get(&template).and_then(RuleTemplate::weight)
    }

    pub fn template(&self, template: TemplateId) -> Option<&RuleTemplate> {
        self.templates.get(&template)
    }

    /// Drop cached factors for weights no template carries and mark the
    /// model stale.
    pub fn notify_weights_changed(&mut self) {
        let live: Vec<u64> = self
            .templates
            .values()
            .filter_map(RuleTemplate::weight)
            .map(f64::to_bits)
            .collect();
        let dropped = self.cache.retain_weights(|w| live.contains(&w.to_bits()));
        debug!("Weights changed, {} cached factors invalidated", dropped);
        self.stale = true;
    }

    // ---- Grounded rules ----

    /// Add a rule, replacing any rule with the same id.
    ///
    /// The rule's shape is checked here. Returns `false` if a rule with the
    /// same id was replaced.
    pub fn add_grounded_rule(&mut self, rule: GroundRule) -> Result<bool> {
        let template = self
            .templates
            .get(&rule.template)
            .ok_or(Error::UnknownTemplate(rule.template))?;
        if template.is_constraint() != rule.is_constraint() {
            return Err(Error::KindMismatch {
                rule: rule.id,
                template: rule.template,
            });
        }
        let compiled = compile(&rule)?;

        self.stale = true;
        let id = rule.id;
        let entry = RuleEntry { rule, compiled };
        match self.positions.get(&id) {
            Some(&position) => {
                self.rules[position] = entry;
                Ok(false)
            }
            None => {
                self.positions.insert(id, self.rules.len());
                self.rules.push(entry);
                Ok(true)
            }
        }
    }

    /// Remove a rule.
    pub fn remove_grounded_rule(&mut self, id: GroundRuleId) -> Option<GroundRule> {
        let position = self.positions.remove(&id)?;
        let entry = self.rules.swap_remove(position);
        if let Some(moved) = self.rules.get(position) {
            self.positions.insert(moved.rule.id, position);
        }
        self.stale = true;
        Some(entry.rule)
    }

    pub fn contains_grounded_rule(&self, id: GroundRuleId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn grounded_rule(&self, id: GroundRuleId) -> Option<&GroundRule> {
        self.positions.get(&id).map(|&p| &self.rules[p].rule)
    }

    pub fn grounded_rules(&self) -> impl Iterator<Item = &GroundRule> + '_ {
        self.rules.iter().map(|e| &e.rule)
    }

    /// Rules grounded from `template`.
    pub fn grounded_rules_of(
        &self,
        template: TemplateId,
    ) -> impl Iterator<Item = &GroundRule> + '_ {
        self.grounded_rules()
            .filter(move |r| r.template == template)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    // ---- Inference ----

    /// Run rounds until activation settles or the round limit is hit, then
    /// leave the settled values in the atom store.
    pub fn optimize(&mut self) -> Result<InferenceSummary> {
        let mut summary = InferenceSummary::default();

        loop {
            let round = self.run_round(summary.rounds + 1)?;
            summary.record(round);

            if self.activation.is_idle() {
                break;
            }
            if summary.rounds >= self.config.max_rounds {
                warn!(
                    "Round limit {} reached with atoms still pending activation",
                    self.config.max_rounds
                );
                break;
            }

            let activation = self.activation.activate(&self.atoms);
            if activation.is_empty() {
                break;
            }
            debug!(
                "Activated {} atoms exposing {} rules",
                activation.activated.len(),
                activation.rules.len()
            );
            for rule in activation.rules {
                self.add_grounded_rule(rule)?;
            }
        }

        self.stale = false;
        let (objective, violated) = self.evaluate();
        summary.objective = objective;
        summary.violated_constraints = violated;
        info!(
            "Inference completed in {} rounds, {} iterations. \
             Objective: {}, violated constraints: {}",
            summary.rounds, summary.iterations, objective, violated
        );
        Ok(summary)
    }

    fn run_round(&mut self, index: usize) -> Result<RoundSummary> {
        let step_size = self.config.step_size;

        let mut round = Round::default();
        for entry in &self.rules {
            let weight = self
                .templates
                .get(&entry.rule.template)
                .and_then(RuleTemplate::weight)
                .unwrap_or(0.0);
            let term = entry.compiled.instantiate(
                &entry.rule,
                weight,
                &self.atoms,
                round.terms.len(),
                &mut round.registry,
                &mut self.cache,
                step_size,
            )?;
            if let Some(term) = term {
                round.term_of.insert(entry.rule.id, round.terms.len());
                round.terms.push(term);
            }
        }

        let parallel = self.config.use_parallel(round.terms.len());
        debug!(
            "Round {}: {} terms over {} variables ({})",
            index,
            round.terms.len(),
            round.registry.len(),
            if parallel { "parallel" } else { "sequential" }
        );

        let config = &self.config;
        let InnerLoop {
            iterations,
            converged,
            primal,
            dual,
            last,
        } = match &self.pool {
            Some(pool) => pool.install(|| iterate(&mut round, config, parallel)),
            None => iterate(&mut round, config, parallel),
        };

        if !converged {
            warn!(
                "Round {} hit the iteration limit {} without converging (primal {}, dual {})",
                index, self.config.max_iterations, primal, dual
            );
        }
        info!(
            "Round {} completed in {} iterations. Primal res.: {}, Dual res.: {}",
            index, iterations, primal, dual
        );

        round.registry.commit_into(&mut self.atoms);

        let summary = RoundSummary {
            round: index,
            iterations,
            converged,
            primal_residual: primal,
            dual_residual: dual,
            terms: round.terms.len(),
            variables: round.registry.len(),
            lagrange_penalty: last.lagrange_penalty,
            augmented_lagrange_penalty: last.augmented_lagrange_penalty,
        };
        self.round = round;
        Ok(summary)
    }

    /// `(Σ weight·incompatibility, violated constraint count)` at the atom values.
    fn evaluate(&self) -> (f64, usize) {
        let mut objective = 0.0;
        let mut violated = 0;
        for entry in &self.rules {
            let incompatibility = entry.rule.incompatibility(&self.atoms);
            if entry.rule.is_constraint() {
                if incompatibility.is_infinite() {
                    violated += 1;
                }
            } else if let Some(weight) = self.weight(entry.rule.template) {
                objective += weight * incompatibility;
            }
        }
        (objective, violated)
    }

    // ---- Results ----

    fn ensure_fresh(&self) -> Result<()> {
        if self.stale {
            Err(Error::StaleModel)
        } else {
            Ok(())
        }
    }

    fn entry(&self, id: GroundRuleId) -> Result<&RuleEntry> {
        self.positions
            .get(&id)
            .map(|&p| &self.rules[p])
            .ok_or(Error::UnknownRule(id))
    }

    /// Incompatibility of a rule at the settled values.
    pub fn incompatibility_of(&self, id: GroundRuleId) -> Result<f64> {
        self.ensure_fresh()?;
        Ok(self.entry(id)?.rule.incompatibility(&self.atoms))
    }

    /// Incompatibilities of every rule grounded from `template`.
    pub fn incompatibilities_of(&self, template: TemplateId) -> Result<Vec<(GroundRuleId, f64)>> {
        self.ensure_fresh()?;
        if !self.templates.contains_key(&template) {
            return Err(Error::UnknownTemplate(template));
        }
        Ok(self
            .grounded_rules_of(template)
            .map(|rule| (rule.id, rule.incompatibility(&self.atoms)))
            .collect())
    }

    /// Incompatibility of a rule at its term's local copies from the last round.
    ///
    /// Rules without a term (all atoms observed) report their ordinary
    /// incompatibility.
    pub fn dual_incompatibility_of(&self, id: GroundRuleId) -> Result<f64> {
        self.ensure_fresh()?;
        let entry = self.entry(id)?;
        Ok(match self.round.term_of.get(&id) {
            Some(&t) => self.round.terms[t].incompatibility(),
            None => entry.rule.incompatibility(&self.atoms),
        })
    }

    /// Terms of the last round.
    pub fn terms(&self) -> &[ObjectiveTerm] {
        &self.round.terms
    }

    /// Consensus variables of the last round.
    pub fn consensus(&self) -> &ConsensusRegistry {
        &self.round.registry
    }

    // ---- Accessors ----

    pub fn atoms(&self) -> &S {
        &self.atoms
    }

    pub fn atoms_mut(&mut self) -> &mut S {
        &mut self.atoms
    }

    pub fn into_atoms(self) -> S {
        self.atoms
    }

    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    pub fn factor_cache(&self) -> &FactorCache {
        &self.cache
    }

    /// Workers available to the parallel phases.
    pub fn num_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
}

fn check_weight(template: TemplateId, weight: f64) -> Result<()> {
    if weight >= 0.0 && weight.is_finite() {
        Ok(())
    } else {
        Err(Error::NegativeWeight { template, weight })
    }
}

/// Minimize, mean update and dual update until both residuals are within
/// tolerance at a stop check, or the iteration cap.
fn iterate(round: &mut Round, config: &ReasonerConfig, parallel: bool) -> InnerLoop {
    let step_size = config.step_size;
    let tolerance = config.residual_tolerance;

    let mut outcome = InnerLoop {
        iterations: 0,
        converged: false,
        primal: f64::INFINITY,
        dual: f64::INFINITY,
        last: MeanUpdate::default(),
    };

    let terms = &mut round.terms;
    let registry = &mut round.registry;
    while outcome.iterations < config.max_iterations {
        minimize_terms(terms, registry.values(), step_size, parallel);
        outcome.last = registry.mean_update(&terms[..], step_size, parallel);
        update_duals(terms, registry.values(), step_size, parallel);
        outcome.iterations += 1;

        outcome.primal = outcome.last.primal_sq.sqrt();
        outcome.dual = outcome.last.dual_sq.sqrt();
        if outcome.iterations % (TRACE_INTERVAL * config.stop_check) == 0 {
            trace!(
                "Residuals at iteration {} -- Primal: {} -- Dual: {}",
                outcome.iterations,
                outcome.primal,
                outcome.dual
            );
        }
        if outcome.iterations % config.stop_check == 0
            && outcome.primal <= tolerance
            && outcome.dual <= tolerance
        {
            outcome.converged = true;
            break;
        }
    }
    outcome
}

fn minimize_terms(terms: &mut [ObjectiveTerm], z: &[f64], step_size: f64, parallel: bool) {
    if parallel {
        terms
            .par_iter_mut()
            .for_each_init(Workspace::new, |workspace, term| {
                term.minimize(z, step_size, workspace)
            });
    } else {
        let mut workspace = Workspace::new();
        for term in terms {
            term.minimize(z, step_size, &mut workspace);
        }
    }
}

fn update_duals(terms: &mut [ObjectiveTerm], z: &[f64], step_size: f64, parallel: bool) {
    if parallel {
        terms
            .par_iter_mut()
            .for_each(|term| term.update_dual(z, step_size));
    } else {
        for term in terms {
            term.update_dual(z, step_size);
        }
    }
}
