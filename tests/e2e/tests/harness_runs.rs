//! Whole-stack runs: toy environments through the runner, artifacts on
//! disk, and a restart from the written state file.

use hypertree_harness::artifact::write_artifact_dir;
use hypertree_harness::envs::linear_chain::LinearChainEnv;
use hypertree_harness::envs::split::SplitEnv;
use hypertree_harness::runner::run_search;
use hypertree_search::params::{Metric, SearchParams};
use hypertree_search::search::Htps;

#[test]
fn chain_run_writes_a_restorable_bundle() {
    let mut env = LinearChainEnv::new(4);
    let report = run_search(env.root_goal(), SearchParams::default(), &mut env, 100).unwrap();
    assert!(report.result.metadata.proven);

    let dir = tempfile::tempdir().unwrap();
    write_artifact_dir(dir.path(), &report).unwrap();

    let state = std::fs::read_to_string(dir.path().join("state.json")).unwrap();
    let mut restored = Htps::from_json_str(&state).unwrap();
    assert!(restored.proven());
    let result = restored.get_result().unwrap();
    assert_eq!(result.metadata.root_goal, "chain/0");
    assert_eq!(
        result.proof.as_ref().map(hypertree_search::proof::ProofTree::depth),
        report.result.proof.as_ref().map(hypertree_search::proof::ProofTree::depth),
    );
}

#[test]
fn split_run_reports_the_dead_end_in_its_samples() {
    let mut env = SplitEnv::new();
    let params = SearchParams {
        metric: Metric::Size,
        ..SearchParams::default()
    };
    let report = run_search(env.root_goal(), params, &mut env, 100).unwrap();
    assert!(report.result.metadata.proven);

    // The failed left branch leaves a killed leaf behind; it must not
    // appear among critic samples (no critic was ever recorded for it),
    // while both proved right subgoals must.
    let critic_goals: Vec<&str> = report
        .result
        .critic_samples
        .iter()
        .map(|s| s.goal.unique_string.as_str())
        .collect();
    assert!(!critic_goals.contains(&"split/left"));
    assert!(critic_goals.contains(&"split/right0"));

    // Effects were observed for every proposed tactic, dead end included.
    let effect_tactics: Vec<&str> = report
        .result
        .effect_samples
        .iter()
        .map(|e| e.tactic.unique_string.as_str())
        .collect();
    assert!(effect_tactics.contains(&"split_left"));
    assert!(effect_tactics.contains(&"split_right"));

    let proof = report.result.proof.unwrap();
    assert_eq!(proof.children.len(), 2);
}

#[test]
fn result_json_artifact_matches_report() {
    let mut env = LinearChainEnv::new(2);
    let report = run_search(env.root_goal(), SearchParams::default(), &mut env, 100).unwrap();
    let dir = tempfile::tempdir().unwrap();
    write_artifact_dir(dir.path(), &report).unwrap();

    let raw = std::fs::read_to_string(dir.path().join("result.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["env_id"], "linear_chain");
    assert_eq!(
        value["metadata"]["expansions_applied"].as_u64().unwrap(),
        report.result.metadata.expansions_applied
    );
    assert_eq!(
        value["tactic_samples"].as_array().unwrap().len(),
        report.result.tactic_samples.len()
    );
}
