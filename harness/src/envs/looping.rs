//! A prover that only ever proposes the goal back to itself.

use hypertree_kernel::env::{EnvEffect, EnvExpansion, TacticProposals};
use hypertree_kernel::lang::{Context, Tactic, Theorem};

use crate::contract::ProvingEnv;

/// Every expansion proposes a single self-referential tactic; the
/// search must mask it as a cycle and judge the root unprovable.
pub struct LoopingEnv;

impl LoopingEnv {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn root_goal(&self) -> Theorem {
        Theorem::new("loops forever", "loop/root", vec![], Context::empty(), vec![])
    }
}

impl Default for LoopingEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvingEnv for LoopingEnv {
    fn env_id(&self) -> &str {
        "looping"
    }

    fn expand_goal(&mut self, goal: &Theorem) -> EnvExpansion {
        let again = Tactic::new("again", true, 1);
        let children = vec![goal.clone()];
        let effects = vec![EnvEffect::new(goal.clone(), again.clone(), children.clone())];
        EnvExpansion::proposed(
            goal.clone(),
            1,
            1,
            vec![1],
            TacticProposals {
                effects,
                log_critic: -1.0,
                tactics: vec![again],
                children_for_tactic: vec![children],
                priors: vec![1.0],
            },
        )
        .unwrap_or_else(|_| EnvExpansion::errored(goal.clone(), "malformed proposals"))
    }
}
