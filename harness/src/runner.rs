//! Harness runner: drives one search to completion against an oracle.
//!
//! The runner owns no search logic. It loops the core's two entry
//! points — `theorems_to_expand` → oracle → `expand_and_backup` — until
//! the search terminates or the expansion budget runs out, then hands
//! back the harvested result together with the final state snapshot.

use hypertree_kernel::env::EnvExpansion;
use hypertree_kernel::lang::Theorem;
use hypertree_search::error::SearchError;
use hypertree_search::params::SearchParams;
use hypertree_search::samples::SearchResult;
use hypertree_search::search::Htps;

use crate::contract::ProvingEnv;

/// Error during a harness run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunError {
    /// Search-core failure (bad params; should not occur mid-run).
    Search(SearchError),
    /// The expansion budget was exhausted before termination.
    ExpansionBudgetExceeded { expansions: u64, budget: u64 },
    /// The environment answered for a different goal than requested.
    EnvContractViolation { requested: String, answered: String },
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Search(e) => write!(f, "search error: {e}"),
            Self::ExpansionBudgetExceeded {
                expansions,
                budget,
            } => write!(f, "expansion budget exceeded: {expansions}/{budget}"),
            Self::EnvContractViolation {
                requested,
                answered,
            } => write!(
                f,
                "environment answered for `{answered}` when asked about `{requested}`"
            ),
        }
    }
}

impl std::error::Error for RunError {}

impl From<SearchError> for RunError {
    fn from(e: SearchError) -> Self {
        Self::Search(e)
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub env_id: String,
    pub result: SearchResult,
    /// Final state snapshot, taken at termination.
    pub state_json: String,
}

/// Run a search on `root` against `env` until it terminates.
///
/// `budget` caps the total number of goals handed to the environment.
///
/// # Errors
///
/// Returns [`RunError::ExpansionBudgetExceeded`] when the cap is hit,
/// [`RunError::EnvContractViolation`] when the oracle answers for the
/// wrong goal, and [`RunError::Search`] for core failures.
pub fn run_search(
    root: Theorem,
    params: SearchParams,
    env: &mut dyn ProvingEnv,
    budget: u64,
) -> Result<RunReport, RunError> {
    let mut htps = Htps::new(root, params)?;
    let mut expansions_sent: u64 = 0;

    while !htps.is_done() {
        let batch = htps.theorems_to_expand();
        if batch.is_empty() {
            // The runner owes nothing between calls, so an empty batch
            // means the call flipped the search terminal.
            break;
        }
        expansions_sent += batch.len() as u64;
        if expansions_sent > budget {
            return Err(RunError::ExpansionBudgetExceeded {
                expansions: expansions_sent,
                budget,
            });
        }
        let mut answers: Vec<EnvExpansion> = Vec::with_capacity(batch.len());
        for goal in &batch {
            let answer = env.expand_goal(goal);
            if answer.thm.unique_string != goal.unique_string {
                return Err(RunError::EnvContractViolation {
                    requested: goal.unique_string.clone(),
                    answered: answer.thm.unique_string,
                });
            }
            answers.push(answer);
        }
        htps.expand_and_backup(&answers);
    }

    let state_json = htps.get_json_str();
    let result = htps.get_result()?;
    Ok(RunReport {
        env_id: env.env_id().to_string(),
        result,
        state_json,
    })
}
