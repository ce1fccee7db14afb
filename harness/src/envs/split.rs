//! A branching prover with one dead end: the left split fails, the
//! right split conjoins two closable subgoals.

use hypertree_kernel::env::{EnvEffect, EnvExpansion, TacticProposals};
use hypertree_kernel::lang::{Context, Tactic, Theorem};

use crate::contract::ProvingEnv;

/// Root splits into a failing branch and a two-subgoal proving branch.
pub struct SplitEnv;

impl SplitEnv {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn root_goal(&self) -> Theorem {
        Self::goal("split/root", "A ∨ (B ∧ C)")
    }

    fn goal(unique: &str, conclusion: &str) -> Theorem {
        Theorem::new(conclusion, unique, vec![], Context::empty(), vec![])
    }
}

impl Default for SplitEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvingEnv for SplitEnv {
    fn env_id(&self) -> &str {
        "split"
    }

    fn expand_goal(&mut self, goal: &Theorem) -> EnvExpansion {
        match goal.unique_string.as_str() {
            "split/root" => {
                let left = Tactic::new("split_left", true, 2);
                let right = Tactic::new("split_right", true, 2);
                let left_kids = vec![Self::goal("split/left", "A")];
                let right_kids = vec![
                    Self::goal("split/right0", "B"),
                    Self::goal("split/right1", "C"),
                ];
                let effects = vec![
                    EnvEffect::new(goal.clone(), left.clone(), left_kids.clone()),
                    EnvEffect::new(goal.clone(), right.clone(), right_kids.clone()),
                ];
                EnvExpansion::proposed(
                    goal.clone(),
                    1,
                    1,
                    vec![1, 1],
                    TacticProposals {
                        effects,
                        log_critic: -0.2,
                        tactics: vec![left, right],
                        children_for_tactic: vec![left_kids, right_kids],
                        priors: vec![0.6, 0.4],
                    },
                )
                .unwrap_or_else(|_| EnvExpansion::errored(goal.clone(), "malformed proposals"))
            }
            "split/left" => EnvExpansion::errored(goal.clone(), "no applicable tactic"),
            "split/right0" | "split/right1" => {
                let close = Tactic::new("close", true, 1);
                let effects = vec![EnvEffect::new(goal.clone(), close.clone(), vec![])];
                EnvExpansion::proposed(
                    goal.clone(),
                    1,
                    1,
                    vec![1],
                    TacticProposals {
                        effects,
                        log_critic: -0.05,
                        tactics: vec![close],
                        children_for_tactic: vec![vec![]],
                        priors: vec![1.0],
                    },
                )
                .unwrap_or_else(|_| EnvExpansion::errored(goal.clone(), "malformed proposals"))
            }
            _ => EnvExpansion::errored(goal.clone(), "unknown goal"),
        }
    }
}
