//! Artifact directory writer: one self-contained directory per run.
//!
//! Layout:
//!
//! ```text
//! <dir>/
//!   state.json    — full search snapshot (restorable via from_json_str)
//!   result.json   — harvested samples and run metadata
//!   proof.json    — minimal proof tree, or `null` when unproven
//! ```
//!
//! Content is deterministic: the same run report always writes
//! byte-identical files.

use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use hypertree_kernel::env::EnvEffect;
use hypertree_kernel::hash::{canonical_hash, DOMAIN_GOAL, DOMAIN_STATE};
use hypertree_kernel::lang::Tactic;
use hypertree_search::proof::ProofTree;
use hypertree_search::samples::{in_proof_str, CriticSample, SearchResult, TacticSample};
use hypertree_search::search::termination_str;

use crate::runner::RunReport;

/// Failure while writing an artifact directory.
#[derive(Debug)]
pub enum ArtifactError {
    Io { path: String, detail: String },
}

impl std::fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, detail } => write!(f, "artifact io failure at {path}: {detail}"),
        }
    }
}

impl std::error::Error for ArtifactError {}

/// Write the run's artifacts into `dir`, creating it if needed.
///
/// # Errors
///
/// Returns [`ArtifactError::Io`] on any filesystem failure.
pub fn write_artifact_dir(dir: &Path, report: &RunReport) -> Result<(), ArtifactError> {
    fs::create_dir_all(dir).map_err(|e| io_error(dir, &e))?;
    write_file(&dir.join("state.json"), report.state_json.as_bytes())?;
    let result = result_to_json(report).to_string();
    write_file(&dir.join("result.json"), result.as_bytes())?;
    let proof = report
        .result
        .proof
        .as_ref()
        .map_or(Value::Null, proof_to_json)
        .to_string();
    write_file(&dir.join("proof.json"), proof.as_bytes())?;
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    fs::write(path, bytes).map_err(|e| io_error(path, &e))
}

fn io_error(path: &Path, e: &std::io::Error) -> ArtifactError {
    ArtifactError::Io {
        path: path.display().to_string(),
        detail: e.to_string(),
    }
}

fn result_to_json(report: &RunReport) -> Value {
    let result: &SearchResult = &report.result;
    // Snapshot bindings: a reader can verify which goal and which exact
    // state this result was harvested from.
    let root_fingerprint = canonical_hash(DOMAIN_GOAL, result.metadata.root_goal.as_bytes());
    let state_digest = canonical_hash(DOMAIN_STATE, report.state_json.as_bytes());
    json!({
        "env_id": report.env_id,
        "metadata": {
            "root_goal": result.metadata.root_goal,
            "root_fingerprint": root_fingerprint.as_str(),
            "state_digest": state_digest.as_str(),
            "total_nodes": result.metadata.total_nodes,
            "expanded_nodes": result.metadata.expanded_nodes,
            "solved_nodes": result.metadata.solved_nodes,
            "batches": result.metadata.batches,
            "expansions_applied": result.metadata.expansions_applied,
            "termination": termination_str(result.metadata.termination),
            "proven": result.metadata.proven,
        },
        "critic_samples": result.critic_samples.iter().map(critic_to_json).collect::<Vec<_>>(),
        "tactic_samples": result.tactic_samples.iter().map(tactic_sample_to_json).collect::<Vec<_>>(),
        "effect_samples": result.effect_samples.iter().map(effect_to_json).collect::<Vec<_>>(),
        "proof_samples_tactics": result.proof_samples_tactics.iter().map(tactic_sample_to_json).collect::<Vec<_>>(),
    })
}

fn critic_to_json(s: &CriticSample) -> Value {
    json!({
        "goal": s.goal.unique_string,
        "q_estimate": s.q_estimate,
        "solved": s.solved,
        "bad": s.bad,
        "critic": s.critic,
        "visit_count": s.visit_count,
    })
}

fn tactic_sample_to_json(s: &TacticSample) -> Value {
    json!({
        "goal": s.goal.unique_string,
        "tactics": s.tactics.iter().map(|t| t.unique_string.as_str()).collect::<Vec<_>>(),
        "target_pi": s.target_pi,
        "inproof": in_proof_str(s.inproof),
        "q_estimates": s.q_estimates,
        "visit_count": s.visit_count,
    })
}

fn effect_to_json(e: &EnvEffect) -> Value {
    json!({
        "goal": e.goal.unique_string,
        "tactic": tactic_to_json(&e.tactic),
        "children": e.children.iter().map(|c| c.unique_string.as_str()).collect::<Vec<_>>(),
    })
}

fn tactic_to_json(t: &Tactic) -> Value {
    json!({
        "unique_string": t.unique_string,
        "is_valid": t.is_valid,
        "duration": t.duration,
    })
}

fn proof_to_json(p: &ProofTree) -> Value {
    json!({
        "theorem": p.theorem.unique_string,
        "tactic": tactic_to_json(&p.tactic),
        "children": p.children.iter().map(proof_to_json).collect::<Vec<_>>(),
    })
}
