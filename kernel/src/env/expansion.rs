//! Expansion records: what the oracle returns for one goal.

use crate::env::effect::EnvEffect;
use crate::error::ValidationError;
use crate::lang::{Tactic, Theorem};

/// Accepted deviation of `sum(priors)` from 1.
pub const PRIOR_SUM_TOLERANCE: f64 = 1e-4;

/// The oracle's answer for one goal: either a failure report or a set of
/// tactic proposals with model scores.
///
/// Construct through [`EnvExpansion::errored`] or
/// [`EnvExpansion::proposed`]; the latter validates the proposal arrays
/// so the search core never sees malformed input.
#[derive(Debug, Clone)]
pub struct EnvExpansion {
    /// The goal this expansion answers.
    pub thm: Theorem,
    /// Time spent by the expander process, milliseconds.
    pub expander_duration: u64,
    /// Time spent generating tactics, milliseconds.
    pub generation_duration: u64,
    /// Per-tactic environment execution times, milliseconds.
    pub env_durations: Vec<u64>,
    pub outcome: ExpansionOutcome,
}

/// Success/failure shape of an expansion.
#[derive(Debug, Clone)]
pub enum ExpansionOutcome {
    /// The environment could not expand the goal; the node becomes
    /// terminal with this error attached.
    Failure { error: String },
    /// Tactic proposals with priors and a critic estimate.
    Proposals(TacticProposals),
}

/// Validated tactic proposals for one goal.
///
/// Invariants (enforced at construction): the three arrays have equal
/// length, every prior is a finite nonnegative number, and the priors
/// sum to 1 within [`PRIOR_SUM_TOLERANCE`].
#[derive(Debug, Clone)]
pub struct TacticProposals {
    /// Transitions observed while evaluating tactics, for harvesting.
    pub effects: Vec<EnvEffect>,
    /// Natural log of the critic's probability-of-provability.
    pub log_critic: f64,
    pub tactics: Vec<Tactic>,
    /// `children_for_tactic[i]` is the multiset of subgoals tactic `i`
    /// splits the goal into, in insertion order.
    pub children_for_tactic: Vec<Vec<Theorem>>,
    pub priors: Vec<f64>,
}

impl EnvExpansion {
    /// An expansion that reports an environment failure.
    #[must_use]
    pub fn errored(thm: Theorem, error: impl Into<String>) -> Self {
        Self {
            thm,
            expander_duration: 0,
            generation_duration: 0,
            env_durations: Vec::new(),
            outcome: ExpansionOutcome::Failure {
                error: error.into(),
            },
        }
    }

    /// A successful expansion carrying tactic proposals.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the proposal arrays disagree in
    /// length, a prior is not a finite nonnegative number, the priors do
    /// not sum to 1 within [`PRIOR_SUM_TOLERANCE`], or `log_critic` is
    /// not finite.
    pub fn proposed(
        thm: Theorem,
        expander_duration: u64,
        generation_duration: u64,
        env_durations: Vec<u64>,
        proposals: TacticProposals,
    ) -> Result<Self, ValidationError> {
        validate_proposals(&proposals)?;
        Ok(Self {
            thm,
            expander_duration,
            generation_duration,
            env_durations,
            outcome: ExpansionOutcome::Proposals(proposals),
        })
    }

    /// Whether this expansion reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ExpansionOutcome::Failure { .. })
    }
}

fn validate_proposals(p: &TacticProposals) -> Result<(), ValidationError> {
    if p.tactics.len() != p.priors.len() || p.tactics.len() != p.children_for_tactic.len() {
        return Err(ValidationError::LengthMismatch {
            tactics: p.tactics.len(),
            priors: p.priors.len(),
            children: p.children_for_tactic.len(),
        });
    }
    if !p.log_critic.is_finite() {
        return Err(ValidationError::NonFiniteCritic {
            value: p.log_critic,
        });
    }
    let mut sum = 0.0;
    for (index, &value) in p.priors.iter().enumerate() {
        if !value.is_finite() || value < 0.0 {
            return Err(ValidationError::BadPrior { index, value });
        }
        sum += value;
    }
    // An empty proposal list is legal (the node degrades to an error at
    // graph level); the sum check only applies when priors exist.
    if !p.priors.is_empty() && (sum - 1.0).abs() > PRIOR_SUM_TOLERANCE {
        return Err(ValidationError::PriorSumMismatch { sum });
    }
    Ok(())
}

/// `exp(log_critic)` clamped into `[0, 1]`.
#[must_use]
pub fn critic_probability(log_critic: f64) -> f64 {
    log_critic.exp().clamp(0.0, 1.0)
}
