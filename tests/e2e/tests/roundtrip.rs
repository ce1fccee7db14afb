//! Snapshot round-trips: serialize, restore, and keep searching.

use e2e_tests::{errored, goal, proposals};
use hypertree_search::params::SearchParams;
use hypertree_search::search::{Htps, TerminationReason};

#[test]
fn snapshot_string_is_stable_under_round_trip() {
    let mut h = Htps::new(goal("R"), SearchParams::default()).unwrap();
    let _ = h.theorems_to_expand();
    h.expand_and_backup(&[proposals(
        "R",
        vec![("tA", 1, vec!["A"], 0.7), ("tB", 1, vec!["B"], 0.3)],
        -0.4,
    )]);
    let first = h.get_json_str();
    let second = Htps::from_json_str(&first).unwrap().get_json_str();
    assert_eq!(first, second);
}

#[test]
fn restored_mid_search_continues_to_a_proof() {
    let mut h = Htps::new(goal("R"), SearchParams::default()).unwrap();
    let _ = h.theorems_to_expand();
    h.expand_and_backup(&[proposals("R", vec![("tA", 1, vec!["A"], 1.0)], -0.5)]);
    assert!(!h.is_done());

    let mut restored = Htps::from_json_str(&h.get_json_str()).unwrap();
    assert!(!restored.is_done());
    let batch = restored.theorems_to_expand();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].unique_string, "A");
    restored.expand_and_backup(&[proposals("A", vec![("close", 1, vec![], 1.0)], -0.1)]);
    assert!(restored.proven());
    assert!(restored.get_result().is_ok());
}

#[test]
fn unprovable_state_round_trips() {
    let mut h = Htps::new(goal("R"), SearchParams::default()).unwrap();
    let _ = h.theorems_to_expand();
    h.expand_and_backup(&[proposals("R", vec![("tA", 1, vec!["A"], 1.0)], -0.5)]);
    let _ = h.theorems_to_expand();
    h.expand_and_backup(&[errored("A", "environment crash")]);
    assert_eq!(h.termination(), Some(TerminationReason::RootUnprovable));

    let restored = Htps::from_json_str(&h.get_json_str()).unwrap();
    assert!(restored.is_done());
    assert!(!restored.proven());
    let a = restored.graph().id_of("A").unwrap();
    assert_eq!(
        restored.graph().node(a).expansion_error(),
        Some("environment crash")
    );
    assert!(restored.graph().node(a).killed);
    assert!(restored.graph().root_killed());
}

#[test]
fn metadata_never_survives_serialization() {
    let mut root = goal("R");
    root.metadata
        .insert("caller_state".to_string(), "opaque".to_string());
    let h = Htps::new(root, SearchParams::default()).unwrap();
    let restored = Htps::from_json_str(&h.get_json_str()).unwrap();
    let rid = restored.graph().root();
    assert!(restored.graph().node(rid).theorem.metadata.is_empty());
    assert_eq!(restored.graph().node(rid).theorem.conclusion, "⊢ R");
}

#[test]
fn non_default_params_survive_the_trip() {
    use hypertree_search::params::{Metric, NodeMask, PolicyType, QValueSolved};
    let params = SearchParams {
        exploration: 2.5,
        policy_type: PolicyType::Rpo,
        q_value_solved: QValueSolved::CountOverCounts,
        metric: Metric::Size,
        node_mask: NodeMask::Solving,
        depth_penalty: 0.8,
        virtual_loss: 0.25,
        ..SearchParams::default()
    };
    let h = Htps::new(goal("R"), params.clone()).unwrap();
    let restored = Htps::from_json_str(&h.get_json_str()).unwrap();
    assert_eq!(*restored.params(), params);
}
