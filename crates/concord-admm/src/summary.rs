//! Inference summaries.

/// Outcome of one round's inner loop.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoundSummary {
    /// 1-based round number.
    pub round: usize,
    pub iterations: usize,
    /// Both residuals reached the tolerance before the iteration cap.
    pub converged: bool,
    pub primal_residual: f64,
    pub dual_residual: f64,
    /// Terms built for the round.
    pub terms: usize,
    /// Consensus variables of the round.
    pub variables: usize,
    pub lagrange_penalty: f64,
    pub augmented_lagrange_penalty: f64,
}

/// Outcome of [`Reasoner::optimize`](crate::Reasoner::optimize).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InferenceSummary {
    pub rounds: usize,
    /// Iterations summed over all rounds.
    pub iterations: usize,
    /// Whether the last round converged.
    pub converged: bool,
    pub primal_residual: f64,
    pub dual_residual: f64,
    /// `Σ weight·incompatibility` over weighted rules at the committed values.
    pub objective: f64,
    /// Constraint rules that do not hold at the committed values.
    pub violated_constraints: usize,
    pub lagrange_penalty: f64,
    pub augmented_lagrange_penalty: f64,
    pub rounds_detail: Vec<RoundSummary>,
}

impl InferenceSummary {
    pub(crate) fn record(&mut self, round: RoundSummary) {
        self.rounds += 1;
        self.iterations += round.iterations;
        self.converged = round.converged;
        self.primal_residual = round.primal_residual;
        self.dual_residual = round.dual_residual;
        self.lagrange_penalty = round.lagrange_penalty;
        self.augmented_lagrange_penalty = round.augmented_lagrange_penalty;
        self.rounds_detail.push(round);
    }

    /// The last round, if any ran.
    pub fn last_round(&self) -> Option<&RoundSummary> {
        self.rounds_detail.last()
    }
}
