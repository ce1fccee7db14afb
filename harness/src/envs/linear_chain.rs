//! A chain prover: each goal reduces to exactly one successor until the
//! final link closes.

use hypertree_kernel::env::{EnvEffect, EnvExpansion, TacticProposals};
use hypertree_kernel::lang::{Context, Tactic, Theorem};

use crate::contract::ProvingEnv;

/// Proves `chain/0` through a fixed number of single-subgoal steps.
pub struct LinearChainEnv {
    steps: usize,
}

impl LinearChainEnv {
    #[must_use]
    pub fn new(steps: usize) -> Self {
        Self { steps }
    }

    /// The root goal of the chain.
    #[must_use]
    pub fn root_goal(&self) -> Theorem {
        Self::goal(0)
    }

    fn goal(index: usize) -> Theorem {
        Theorem::new(
            format!("chain holds from {index}"),
            format!("chain/{index}"),
            vec![],
            Context::empty(),
            vec![],
        )
    }

    fn index_of(goal: &Theorem) -> Option<usize> {
        goal.unique_string.strip_prefix("chain/")?.parse().ok()
    }
}

impl ProvingEnv for LinearChainEnv {
    fn env_id(&self) -> &str {
        "linear_chain"
    }

    fn expand_goal(&mut self, goal: &Theorem) -> EnvExpansion {
        let Some(index) = Self::index_of(goal) else {
            return EnvExpansion::errored(goal.clone(), "goal outside the chain");
        };
        let (tactic, children) = if index < self.steps {
            (
                Tactic::new(format!("step_{index}"), true, 1),
                vec![Self::goal(index + 1)],
            )
        } else {
            (Tactic::new("close", true, 1), vec![])
        };
        let effects = vec![EnvEffect::new(goal.clone(), tactic.clone(), children.clone())];
        #[allow(clippy::cast_precision_loss)]
        let log_critic = -0.05 * (self.steps.saturating_sub(index)) as f64;
        EnvExpansion::proposed(
            goal.clone(),
            1,
            1,
            vec![1],
            TacticProposals {
                effects,
                log_critic,
                tactics: vec![tactic],
                children_for_tactic: vec![children],
                priors: vec![1.0],
            },
        )
        .unwrap_or_else(|_| EnvExpansion::errored(goal.clone(), "malformed proposals"))
    }
}
