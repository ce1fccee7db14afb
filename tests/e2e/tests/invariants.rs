//! Structural invariants that must hold in every reachable state.

use e2e_tests::{goal, proposals};
use hypertree_search::params::SearchParams;
use hypertree_search::search::Htps;

/// Every backup pass must fully reverse the virtual loss it consumed.
fn assert_no_virtual_loss(h: &Htps) {
    for (id, node) in h.graph().iter() {
        for (e, edge) in node.edges.iter().enumerate() {
            assert_eq!(
                edge.virtual_count, 0,
                "edge {e} of {id} still carries virtual loss"
            );
        }
    }
}

#[test]
fn virtual_loss_fully_reversed_after_each_backup() {
    let mut h = Htps::new(goal("R"), SearchParams::default()).unwrap();
    let _ = h.theorems_to_expand();
    h.expand_and_backup(&[proposals(
        "R",
        vec![("tA", 1, vec!["A"], 0.5), ("tB", 1, vec!["B"], 0.5)],
        -0.5,
    )]);
    assert_no_virtual_loss(&h);

    let batch = h.theorems_to_expand();
    let answers: Vec<_> = batch
        .iter()
        .map(|t| proposals(&t.unique_string, vec![("close", 1, vec![], 1.0)], -0.1))
        .collect();
    h.expand_and_backup(&answers);
    assert_no_virtual_loss(&h);
}

#[test]
fn visit_counts_match_edge_counts_plus_leaf_visits() {
    let mut h = Htps::new(goal("R"), SearchParams::default()).unwrap();
    let _ = h.theorems_to_expand();
    h.expand_and_backup(&[proposals("R", vec![("tA", 1, vec!["A"], 1.0)], -0.5)]);
    let _ = h.theorems_to_expand();
    h.expand_and_backup(&[proposals("A", vec![("tA2", 1, vec![], 1.0)], -0.1)]);

    let g = h.graph();
    let root = g.root();
    let a = g.id_of("A").unwrap();
    // Root: one leaf visit (its own expansion) + one pass down tA.
    let root_edge_n: u64 = g.node(root).edges.iter().map(|e| e.n).sum();
    assert_eq!(root_edge_n, 1);
    assert_eq!(g.node(root).visit_count, root_edge_n + 1);
    // A: terminated one descent as a leaf, has no visited edges.
    assert_eq!(g.node(a).visit_count, 1);
}

#[test]
fn solved_stays_solved_through_further_calls() {
    let mut h = Htps::new(goal("R"), SearchParams::default()).unwrap();
    let _ = h.theorems_to_expand();
    h.expand_and_backup(&[proposals("R", vec![("t1", 1, vec![], 1.0)], 0.0)]);
    assert!(h.proven());
    for _ in 0..3 {
        let _ = h.theorems_to_expand();
        h.expand_and_backup(&[]);
        assert!(h.proven(), "solved must be monotone");
    }
}

#[test]
fn prior_sum_holds_right_after_expansion() {
    let mut h = Htps::new(goal("R"), SearchParams::default()).unwrap();
    let _ = h.theorems_to_expand();
    h.expand_and_backup(&[proposals(
        "R",
        vec![
            ("a", 1, vec!["X"], 0.25),
            ("b", 1, vec!["Y"], 0.25),
            ("c", 1, vec!["Z"], 0.5),
        ],
        -0.5,
    )]);
    let root = h.graph().root();
    let mass: f64 = h.graph().node(root).edges.iter().map(|e| e.prior).sum();
    assert!((mass - 1.0).abs() <= 1e-4);
}

#[test]
fn backup_of_unknown_expansion_changes_nothing() {
    let mut h = Htps::new(goal("R"), SearchParams::default()).unwrap();
    let _ = h.theorems_to_expand();
    h.expand_and_backup(&[proposals("R", vec![("tA", 1, vec!["A"], 1.0)], -0.5)]);
    let _ = h.theorems_to_expand();
    let visits_before = h.graph().node(h.graph().root()).visit_count;

    // Unsolicited expansion for a goal that was never selected.
    h.expand_and_backup(&[proposals("elsewhere", vec![("t", 1, vec![], 1.0)], 0.0)]);
    assert_eq!(h.graph().node(h.graph().root()).visit_count, visits_before);
}

#[test]
fn backup_once_counts_each_edge_once_per_pass() {
    let params = SearchParams {
        backup_once: true,
        num_expansions: 4,
        ..SearchParams::default()
    };
    let mut h = Htps::new(goal("R"), params).unwrap();
    let _ = h.theorems_to_expand();
    h.expand_and_backup(&[proposals("R", vec![("tA", 1, vec!["A"], 1.0)], -0.5)]);

    // Two batches selecting the same leaf path; the second call's paths
    // all funnel through (root, tA).
    let _ = h.theorems_to_expand();
    let _ = h.theorems_to_expand();
    h.expand_and_backup(&[proposals("A", vec![("close", 1, vec![], 1.0)], -0.1)]);

    let root = h.graph().root();
    // Both recorded paths were consumed in one pass: virtual loss fully
    // reversed, statistics counted once.
    assert_no_virtual_loss(&h);
    assert_eq!(h.graph().node(root).edges[0].n, 1);
}
