//! Proving-environment contract trait.

use hypertree_kernel::env::EnvExpansion;
use hypertree_kernel::lang::Theorem;

/// The oracle the search drives: tactic execution plus policy/critic
/// scoring, rolled into one expansion call per goal.
///
/// # Contract
///
/// - `expand_goal` must answer for exactly the goal it was handed: the
///   returned expansion's `thm` must carry the same `unique_string`.
/// - Expansion must be deterministic: same goal → same proposals in the
///   same order. The runner replays batches and relies on this.
/// - An environment failure is reported as an errored expansion, never
///   by panicking.
pub trait ProvingEnv {
    /// Unique environment identifier, recorded in artifacts.
    fn env_id(&self) -> &str;

    /// Run the environment and model on one goal.
    fn expand_goal(&mut self, goal: &Theorem) -> EnvExpansion;
}
