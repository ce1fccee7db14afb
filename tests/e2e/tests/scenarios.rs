//! The literal end-to-end scenarios: trivial proof, two-step proof,
//! dead-end fallback, cycle handling, prior validation, JSON restart.

use e2e_tests::{errored, goal, proposals};
use hypertree_kernel::env::{EnvExpansion, TacticProposals};
use hypertree_kernel::error::ValidationError;
use hypertree_kernel::lang::Tactic;
use hypertree_search::params::{Metric, SearchParams};
use hypertree_search::search::{Htps, TerminationReason};

fn params() -> SearchParams {
    SearchParams {
        metric: Metric::Time,
        ..SearchParams::default()
    }
}

#[test]
fn scenario_trivial_proof() {
    let mut h = Htps::new(goal("R"), params()).unwrap();
    let batch = h.theorems_to_expand();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].unique_string, "R");

    h.expand_and_backup(&[proposals("R", vec![("t1", 1, vec![], 1.0)], 0.0)]);
    assert!(h.proven());
    assert!(h.is_done());

    let result = h.get_result().unwrap();
    let proof = result.proof.unwrap();
    assert_eq!(proof.theorem.unique_string, "R");
    assert_eq!(proof.tactic.unique_string, "t1");
    assert!(proof.children.is_empty());
}

#[test]
fn scenario_two_step_proof() {
    let mut h = Htps::new(goal("R"), params()).unwrap();
    let _ = h.theorems_to_expand();
    h.expand_and_backup(&[proposals("R", vec![("tA", 1, vec!["A"], 1.0)], -0.5)]);

    let batch = h.theorems_to_expand();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].unique_string, "A");

    h.expand_and_backup(&[proposals("A", vec![("tA2", 1, vec![], 1.0)], -0.1)]);
    assert!(h.proven());

    let result = h.get_result().unwrap();
    assert_eq!(result.critic_samples.len(), 2);
    assert_eq!(result.tactic_samples.len(), 2);
    assert_eq!(result.effect_samples.len(), 2);
    let proof = result.proof.unwrap();
    assert_eq!(proof.tactic.unique_string, "tA");
    assert_eq!(proof.children[0].tactic.unique_string, "tA2");
}

#[test]
fn scenario_alternative_tactic_survives_dead_end() {
    let mut h = Htps::new(goal("R"), params()).unwrap();
    let _ = h.theorems_to_expand();
    h.expand_and_backup(&[proposals(
        "R",
        vec![("tA", 1, vec!["A"], 0.5), ("tB", 1, vec!["B"], 0.5)],
        -0.5,
    )]);

    // Answer every outstanding leaf until the search settles: `A` closes
    // trivially, `B` reports an environment error.
    while !h.is_done() {
        let batch = h.theorems_to_expand();
        if h.is_done() || batch.is_empty() {
            break;
        }
        let answers: Vec<EnvExpansion> = batch
            .iter()
            .map(|t| match t.unique_string.as_str() {
                "A" => proposals("A", vec![("ta", 1, vec![], 1.0)], -0.1),
                "B" => errored("B", "tactic failed"),
                other => panic!("unexpected goal {other}"),
            })
            .collect();
        h.expand_and_backup(&answers);
    }

    assert!(h.proven());
    let result = h.get_result().unwrap();
    let proof = result.proof.unwrap();
    assert_eq!(proof.tactic.unique_string, "tA");
}

#[test]
fn scenario_cycle_only_edge_is_unprovable() {
    let mut h = Htps::new(goal("R"), params()).unwrap();
    let _ = h.theorems_to_expand();
    h.expand_and_backup(&[proposals("R", vec![("tC", 1, vec!["R"], 1.0)], 0.0)]);

    assert!(h.is_done());
    assert!(!h.proven());
    assert_eq!(h.termination(), Some(TerminationReason::RootUnprovable));

    let result = h.get_result().unwrap();
    assert!(result.proof.is_none());
    assert!(!result.metadata.proven);
}

#[test]
fn scenario_prior_sum_validation_fails_construction() {
    let err = EnvExpansion::proposed(
        goal("R"),
        0,
        0,
        vec![],
        TacticProposals {
            effects: vec![],
            log_critic: 0.0,
            tactics: vec![Tactic::new("a", true, 1), Tactic::new("b", true, 1)],
            children_for_tactic: vec![vec![], vec![]],
            priors: vec![0.4, 0.8],
        },
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::PriorSumMismatch { .. }));
}

#[test]
fn scenario_restart_via_json() {
    let mut h = Htps::new(goal("R"), params()).unwrap();
    let _ = h.theorems_to_expand();
    h.expand_and_backup(&[proposals("R", vec![("tA", 1, vec!["A"], 1.0)], -0.5)]);
    let _ = h.theorems_to_expand();
    h.expand_and_backup(&[proposals("A", vec![("tA2", 1, vec![], 1.0)], -0.1)]);
    assert!(h.is_done());

    let snapshot = h.get_json_str();
    let before = h.get_result().unwrap();

    let mut restored = Htps::from_json_str(&snapshot).unwrap();
    assert!(restored.is_done());
    let after = restored.get_result().unwrap();

    assert_eq!(after.critic_samples.len(), before.critic_samples.len());
    assert_eq!(after.tactic_samples.len(), before.tactic_samples.len());
    assert_eq!(after.effect_samples.len(), before.effect_samples.len());
    assert_eq!(after.metadata.batches, before.metadata.batches);
    assert_eq!(after.proof, before.proof);
    assert_eq!(after.metadata.proven, before.metadata.proven);
    assert_eq!(after.metadata.termination, before.metadata.termination);
    for (a, b) in after.critic_samples.iter().zip(&before.critic_samples) {
        assert_eq!(a.goal.unique_string, b.goal.unique_string);
        assert!((a.q_estimate - b.q_estimate).abs() < 1e-12);
        assert_eq!(a.visit_count, b.visit_count);
    }
}
