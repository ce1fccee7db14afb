//! Shared builders for the end-to-end test suite.

#![forbid(unsafe_code)]

use hypertree_kernel::env::{EnvEffect, EnvExpansion, TacticProposals};
use hypertree_kernel::lang::{Context, Tactic, Theorem};

/// A bare goal with the given unique string.
#[must_use]
pub fn goal(unique: &str) -> Theorem {
    Theorem::new(format!("⊢ {unique}"), unique, vec![], Context::empty(), vec![])
}

/// A successful expansion: one entry per tactic as
/// `(name, duration, children, prior)`, with effects mirroring the
/// proposals the way a real environment reports them.
///
/// # Panics
///
/// Panics when the proposal arrays fail kernel validation — test
/// fixtures are expected to be well-formed.
#[must_use]
pub fn proposals(
    target: &str,
    tactics: Vec<(&str, u64, Vec<&str>, f64)>,
    log_critic: f64,
) -> EnvExpansion {
    let mut ts = Vec::new();
    let mut children_lists = Vec::new();
    let mut priors = Vec::new();
    let mut effects = Vec::new();
    for (name, duration, children, prior) in tactics {
        let tactic = Tactic::new(name, true, duration);
        let child_goals: Vec<Theorem> = children.into_iter().map(goal).collect();
        effects.push(EnvEffect::new(
            goal(target),
            tactic.clone(),
            child_goals.clone(),
        ));
        ts.push(tactic);
        children_lists.push(child_goals);
        priors.push(prior);
    }
    EnvExpansion::proposed(
        goal(target),
        1,
        1,
        vec![1; ts.len()],
        TacticProposals {
            effects,
            log_critic,
            tactics: ts,
            children_for_tactic: children_lists,
            priors,
        },
    )
    .expect("well-formed test proposals")
}

/// An errored expansion for the given goal.
#[must_use]
pub fn errored(target: &str, message: &str) -> EnvExpansion {
    EnvExpansion::errored(goal(target), message)
}
