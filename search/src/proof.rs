//! Minimal-proof extraction from a solved hypergraph.
//!
//! A solved node's proof options form an AND/OR structure: pick one edge
//! whose children are all solved, then a proof for every child. The
//! extraction finalizes per-node costs bottom-up — a node's cost becomes
//! known only once every child of some proving edge is known — which
//! rules out cyclic "proofs" by construction: a cost derivation always
//! follows the acyclic witness that solved the node in the first place.

use std::collections::{HashMap, HashSet, VecDeque};

use hypertree_kernel::lang::{Tactic, Theorem};

use crate::graph::{HyperGraph, NodeId};
use crate::params::Metric;

/// A finite proof tree: one tactic per goal, one subtree per subgoal
/// occurrence. Shared subproofs are duplicated — this is a tree, not
/// the hypergraph.
#[derive(Debug, Clone, PartialEq)]
pub struct ProofTree {
    pub theorem: Theorem,
    pub tactic: Tactic,
    pub children: Vec<ProofTree>,
}

impl ProofTree {
    /// Total number of goals in the tree (occurrences, not distinct).
    #[must_use]
    pub fn goal_count(&self) -> usize {
        1 + self.children.iter().map(ProofTree::goal_count).sum::<usize>()
    }

    /// Tree depth: a leaf tactic counts 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(ProofTree::depth).max().unwrap_or(0)
    }

    /// Sum of tactic durations over the tree.
    #[must_use]
    pub fn total_duration(&self) -> u64 {
        self.tactic.duration
            + self
                .children
                .iter()
                .map(ProofTree::total_duration)
                .sum::<u64>()
    }
}

/// Extract the minimal proof of the root under `metric`, setting
/// `in_proof`, `in_minimal_proof`, and `minimal_edge` on the way.
///
/// Returns `None` when the root is not solved.
pub fn minimal_proof(graph: &mut HyperGraph, metric: Metric) -> Option<ProofTree> {
    if !graph.root_solved() {
        return None;
    }
    mark_in_proof(graph);
    let best = best_proof_edges(graph, metric);
    mark_minimal(graph, &best);
    build_tree(graph, &best, graph.root())
}

/// Flag every node reachable from the root through proving edges of
/// solved nodes. Tolerates cycles via the visited set.
pub(crate) fn mark_in_proof(graph: &mut HyperGraph) {
    let ids: Vec<NodeId> = graph.iter().map(|(id, _)| id).collect();
    for id in ids {
        let node = graph.node_mut(id);
        node.in_proof = false;
        node.in_minimal_proof = false;
        node.minimal_edge = None;
    }
    if !graph.root_solved() {
        return;
    }
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut queue = VecDeque::from([graph.root()]);
    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        if !graph.node(id).solved {
            continue;
        }
        graph.node_mut(id).in_proof = true;
        for e in 0..graph.node(id).edges.len() {
            if !graph.edge_solved(id, e) {
                continue;
            }
            for &child in &graph.node(id).edges[e].children.clone() {
                queue.push_back(child);
            }
        }
    }
}

/// Per-node best proving edge, minimizing the metric; ties go to the
/// lower edge index (insertion order).
///
/// Bounded-pass fixpoint: each pass relaxes every solved node against
/// edges whose children are already costed. Costs only decrease, and
/// every derivation is acyclic, so `|solved| + 1` passes suffice.
fn best_proof_edges(graph: &HyperGraph, metric: Metric) -> HashMap<NodeId, usize> {
    let solved: Vec<NodeId> = graph
        .iter()
        .filter(|(_, n)| n.solved)
        .map(|(id, _)| id)
        .collect();

    let mut cost: HashMap<NodeId, u64> = HashMap::new();
    let mut goal_sets: HashMap<NodeId, HashSet<NodeId>> = HashMap::new();
    let mut best: HashMap<NodeId, usize> = HashMap::new();

    for _pass in 0..=solved.len() {
        let mut changed = false;
        for &id in &solved {
            let node = graph.node(id);
            for (e, edge) in node.edges.iter().enumerate() {
                if !graph.edge_solved(id, e) {
                    continue;
                }
                if edge.children.iter().any(|c| !cost.contains_key(c)) {
                    continue;
                }
                let candidate = match metric {
                    Metric::Time => {
                        edge.tactic.duration
                            + edge.children.iter().map(|c| cost[c]).sum::<u64>()
                    }
                    Metric::Depth => {
                        1 + edge.children.iter().map(|c| cost[c]).max().unwrap_or(0)
                    }
                    Metric::Size => {
                        let mut goals: HashSet<NodeId> = HashSet::from([id]);
                        for c in &edge.children {
                            goals.extend(goal_sets[c].iter().copied());
                        }
                        goals.len() as u64
                    }
                };
                let current = cost.get(&id).copied();
                let improves = match current {
                    None => true,
                    Some(cur) => {
                        candidate < cur || (candidate == cur && e < best[&id])
                    }
                };
                if improves {
                    cost.insert(id, candidate);
                    best.insert(id, e);
                    if metric == Metric::Size {
                        let edge = &graph.node(id).edges[e];
                        let mut goals: HashSet<NodeId> = HashSet::from([id]);
                        for c in &edge.children {
                            goals.extend(goal_sets[c].iter().copied());
                        }
                        goal_sets.insert(id, goals);
                    }
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    best
}

/// Flag the minimal-proof projection from the root.
fn mark_minimal(graph: &mut HyperGraph, best: &HashMap<NodeId, usize>) {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut queue = VecDeque::from([graph.root()]);
    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        let Some(&e) = best.get(&id) else {
            continue;
        };
        let node = graph.node_mut(id);
        node.in_minimal_proof = true;
        node.minimal_edge = Some(e);
        for &child in &graph.node(id).edges[e].children.clone() {
            queue.push_back(child);
        }
    }
}

fn build_tree(
    graph: &HyperGraph,
    best: &HashMap<NodeId, usize>,
    id: NodeId,
) -> Option<ProofTree> {
    let &e = best.get(&id)?;
    let node = graph.node(id);
    let edge = &node.edges[e];
    let mut children = Vec::with_capacity(edge.children.len());
    for &child in &edge.children {
        children.push(build_tree(graph, best, child)?);
    }
    Some(ProofTree {
        theorem: node.theorem.clone(),
        tactic: edge.tactic.clone(),
        children,
    })
}
