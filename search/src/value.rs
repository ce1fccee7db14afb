//! Edge valuation and policy scoring.
//!
//! One function owns selection ([`select_edge`]) and switches on
//! [`PolicyType`] — no polymorphic dispatch at the scorer seam. Values
//! follow AND-semantics: an edge is worth the depth-penalized product of
//! its children's estimates, so a single hopeless subgoal drags the
//! whole tactic down.

#![allow(clippy::cast_precision_loss)]

use std::collections::HashSet;

use hypertree_kernel::env::critic_probability;

use crate::graph::{GraphNode, HyperEdge, HyperGraph, NodeId};
use crate::params::{NodeMask, PolicyType, QValueSolved, SearchParams};

/// Current value estimate of a node, as seen by its parents.
///
/// Killed nodes are worth 0. Solved nodes contribute according to
/// `q_value_solved`. Everything else falls back to accumulated edge
/// statistics, then the critic, then `tactic_init_value`.
#[must_use]
pub fn node_value(graph: &HyperGraph, params: &SearchParams, id: NodeId) -> f64 {
    let node = graph.node(id);
    if node.killed {
        return 0.0;
    }
    if node.solved {
        let count = node.visit_count as f64;
        return match params.q_value_solved {
            QValueSolved::One => 1.0,
            QValueSolved::OneOverCounts => 1.0 / (1.0 + count),
            QValueSolved::CountOverCounts => count / (1.0 + count),
            QValueSolved::None => estimate(node, params),
        };
    }
    estimate(node, params)
}

/// Visit-weighted estimate with critic fallback, ignoring solved/killed
/// conventions. The harvester uses this raw form for critic samples.
pub(crate) fn node_estimate(graph: &HyperGraph, params: &SearchParams, id: NodeId) -> f64 {
    estimate(graph.node(id), params)
}

/// Visit-weighted estimate with critic fallback.
fn estimate(node: &GraphNode, params: &SearchParams) -> f64 {
    let visits: u64 = node.edges.iter().map(|e| e.n).sum();
    if visits > 0 {
        let w: f64 = node.edges.iter().map(|e| e.w).sum();
        return (w / visits as f64).clamp(0.0, 1.0);
    }
    if params.no_critic {
        return params.tactic_init_value;
    }
    match node.log_critic {
        Some(lc) => critic_probability(lc),
        None => params.tactic_init_value,
    }
}

/// AND-product value of an edge: `depth_penalty · Π node_value(child)`.
#[must_use]
pub fn edge_value(graph: &HyperGraph, params: &SearchParams, id: NodeId, edge_idx: usize) -> f64 {
    let edge = &graph.node(id).edges[edge_idx];
    let product: f64 = edge
        .children
        .iter()
        .map(|&c| node_value(graph, params, c))
        .product();
    params.depth_penalty * product
}

/// Q estimate of an edge with the virtual-loss penalty applied.
///
/// An unvisited edge is valued by its current AND-product; a visited
/// edge by its running average `W/N`. Each in-flight selection subtracts
/// `virtual_loss · vc / (n + vc + 1)` so concurrent descents diverge.
#[must_use]
pub fn edge_q(graph: &HyperGraph, params: &SearchParams, id: NodeId, edge_idx: usize) -> f64 {
    let edge = &graph.node(id).edges[edge_idx];
    let q = if edge.n > 0 {
        (edge.w / edge.n as f64).clamp(0.0, 1.0)
    } else {
        edge_value(graph, params, id, edge_idx)
    };
    let vc = edge.virtual_count as f64;
    let penalized = q - params.virtual_loss * vc / (edge.n as f64 + vc + 1.0);
    penalized.clamp(0.0, 1.0)
}

/// May a descent step into `child` under the configured node mask?
///
/// Proof-family masks only bite once the root is solved; before that
/// they degrade to their unmasked/solving behavior.
pub(crate) fn descend_allowed(graph: &HyperGraph, params: &SearchParams, child: NodeId) -> bool {
    let node = graph.node(child);
    match params.node_mask {
        NodeMask::NoMask => true,
        NodeMask::Solving => !node.solved,
        NodeMask::Proof => !graph.root_solved() || node.in_proof,
        NodeMask::MinimalProof => !graph.root_solved() || node.in_minimal_proof,
        NodeMask::MinimalProofSolving => {
            if graph.root_solved() {
                node.in_minimal_proof && !node.solved
            } else {
                !node.solved
            }
        }
    }
}

/// Children of the edge a descent may continue into: allowed by the
/// mask and not already on the current path.
fn selectable_children(
    graph: &HyperGraph,
    params: &SearchParams,
    edge: &HyperEdge,
    on_path: &HashSet<NodeId>,
) -> Vec<NodeId> {
    edge.children
        .iter()
        .copied()
        .filter(|&c| !on_path.contains(&c) && descend_allowed(graph, params, c))
        .collect()
}

/// Whether an edge can carry a descent right now.
fn edge_selectable(
    graph: &HyperGraph,
    params: &SearchParams,
    edge: &HyperEdge,
    on_path: &HashSet<NodeId>,
) -> bool {
    !edge.dead
        && !edge.cycle_masked
        && !selectable_children(graph, params, edge, on_path).is_empty()
}

/// Pick the best edge at `id` under the configured policy scorer.
///
/// Returns `None` when no edge can carry a descent (all dead, masked,
/// or leading only to on-path or mask-excluded children).
pub(crate) fn select_edge(
    graph: &HyperGraph,
    params: &SearchParams,
    id: NodeId,
    on_path: &HashSet<NodeId>,
) -> Option<usize> {
    let node = graph.node(id);
    let candidates: Vec<usize> = (0..node.edges.len())
        .filter(|&e| edge_selectable(graph, params, &node.edges[e], on_path))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    let parent_visits: u64 = node.edges.iter().map(HyperEdge::visits).sum();

    let score_of: Box<dyn Fn(usize) -> f64 + '_> = match params.policy_type {
        PolicyType::AlphaZero => {
            let sqrt_parent = (parent_visits as f64).sqrt();
            Box::new(move |e: usize| {
                let edge = &node.edges[e];
                edge_q(graph, params, id, e)
                    + params.exploration * normalized_prior(node, edge) * sqrt_parent
                        / (1.0 + edge.visits() as f64)
            })
        }
        PolicyType::Rpo => {
            // Closed-form regularized policy: π ∝ prior · exp(Q/τ),
            // then pick the edge lagging furthest behind its target mass.
            let weights: Vec<(usize, f64)> = candidates
                .iter()
                .map(|&e| {
                    let w = normalized_prior(node, &node.edges[e])
                        * (edge_q(graph, params, id, e) / params.policy_temperature).exp();
                    (e, w)
                })
                .collect();
            let total: f64 = weights.iter().map(|(_, w)| w).sum();
            Box::new(move |e: usize| {
                let weight = weights
                    .iter()
                    .find(|(i, _)| *i == e)
                    .map_or(0.0, |(_, w)| *w);
                let pi = if total > 0.0 { weight / total } else { 0.0 };
                pi - node.edges[e].visits() as f64 / (1.0 + parent_visits as f64)
            })
        }
        PolicyType::Other => Box::new(move |e: usize| {
            let edge = &node.edges[e];
            if parent_visits == 0 {
                normalized_prior(node, edge)
            } else {
                edge_q(graph, params, id, e)
            }
        }),
    };

    let mut best = candidates[0];
    let mut best_score = score_of(best);
    for &e in &candidates[1..] {
        let score = score_of(e);
        if score > best_score {
            best = e;
            best_score = score;
        }
    }
    Some(best)
}

/// Pick the child a descent continues into along `edge_idx`.
///
/// Round-robins across the subgoals that still need proving (falling
/// back to all selectable children when everything is already solved),
/// rotating on the edge's visit counter so successive descents spread
/// over the conjunction.
pub(crate) fn pick_child(
    graph: &HyperGraph,
    params: &SearchParams,
    id: NodeId,
    edge_idx: usize,
    on_path: &HashSet<NodeId>,
) -> Option<NodeId> {
    let edge = &graph.node(id).edges[edge_idx];
    let selectable = selectable_children(graph, params, edge, on_path);
    if selectable.is_empty() {
        return None;
    }
    let unproven: Vec<NodeId> = selectable
        .iter()
        .copied()
        .filter(|&c| !graph.node(c).solved)
        .collect();
    let pool = if unproven.is_empty() {
        &selectable
    } else {
        &unproven
    };
    #[allow(clippy::cast_possible_truncation)]
    let rotation = (edge.visits() as usize) % pool.len();
    Some(pool[rotation])
}

fn normalized_prior(node: &GraphNode, edge: &HyperEdge) -> f64 {
    if node.prior_mass > 0.0 {
        edge.prior / node.prior_mass
    } else {
        edge.prior
    }
}
