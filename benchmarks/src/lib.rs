//! Shared helpers for hypertree benchmark suites.

#![forbid(unsafe_code)]

use hypertree_harness::contract::ProvingEnv;
use hypertree_kernel::env::{EnvEffect, EnvExpansion, TacticProposals};
use hypertree_kernel::lang::{Context, Tactic, Theorem};

/// A balanced OR-tree prover: every goal above the closing depth
/// proposes `branching` tactics with one subgoal each; goals at the
/// closing depth close immediately.
///
/// Goal unique strings encode their path (`fan/0.2.1`), so expansion is
/// a pure function of the goal.
pub struct FanoutEnv {
    branching: usize,
    depth: usize,
}

impl FanoutEnv {
    #[must_use]
    pub fn new(branching: usize, depth: usize) -> Self {
        Self { branching, depth }
    }

    #[must_use]
    pub fn root_goal(&self) -> Theorem {
        Self::goal("fan/0")
    }

    fn goal(unique: &str) -> Theorem {
        Theorem::new(
            format!("fanout holds at {unique}"),
            unique,
            vec![],
            Context::empty(),
            vec![],
        )
    }

    fn depth_of(unique: &str) -> usize {
        unique.matches('.').count()
    }
}

impl ProvingEnv for FanoutEnv {
    fn env_id(&self) -> &str {
        "fanout"
    }

    fn expand_goal(&mut self, goal: &Theorem) -> EnvExpansion {
        let depth = Self::depth_of(&goal.unique_string);
        let (tactics, children_for_tactic, priors) = if depth < self.depth {
            let mut tactics = Vec::with_capacity(self.branching);
            let mut children = Vec::with_capacity(self.branching);
            #[allow(clippy::cast_precision_loss)]
            let prior = 1.0 / self.branching as f64;
            for i in 0..self.branching {
                tactics.push(Tactic::new(format!("branch_{i}"), true, 1));
                children.push(vec![Self::goal(&format!("{}.{i}", goal.unique_string))]);
            }
            (tactics, children, vec![prior; self.branching])
        } else {
            (
                vec![Tactic::new("close", true, 1)],
                vec![vec![]],
                vec![1.0],
            )
        };
        let effects: Vec<EnvEffect> = tactics
            .iter()
            .zip(&children_for_tactic)
            .map(|(t, kids)| EnvEffect::new(goal.clone(), t.clone(), kids.clone()))
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let log_critic = -0.1 * (self.depth.saturating_sub(depth)) as f64;
        EnvExpansion::proposed(
            goal.clone(),
            1,
            1,
            vec![1; tactics.len()],
            TacticProposals {
                effects,
                log_critic,
                tactics,
                children_for_tactic,
                priors,
            },
        )
        .unwrap_or_else(|_| EnvExpansion::errored(goal.clone(), "malformed proposals"))
    }
}
