//! Training-sample harvesting from a terminal search.
//!
//! Harvesting walks the (possibly cyclic) hypergraph through the arena,
//! never by recursion over edges, so recurrent subgoals cannot loop it.
//! Subsampling decisions are gated by content hash rather than a random
//! number generator: the same search state always yields the same
//! samples.

use std::collections::HashSet;

use hypertree_kernel::env::EnvEffect;
use hypertree_kernel::hash::{canonical_hash, DOMAIN_SAMPLE_GATE};
use hypertree_kernel::lang::{Tactic, Theorem};

use crate::graph::NodeId;
use crate::proof::{self, ProofTree};
use crate::search::{Htps, TerminationReason};
use crate::value;

/// Proof-membership label attached to tactic samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InProof {
    NotInProof,
    InProof,
    InMinimalProof,
}

/// Stable tag string for artifact serialization.
#[must_use]
pub fn in_proof_str(p: InProof) -> &'static str {
    match p {
        InProof::NotInProof => "not_in_proof",
        InProof::InProof => "in_proof",
        InProof::InMinimalProof => "in_minimal_proof",
    }
}

/// One critic training sample: how provable did this goal turn out?
#[derive(Debug, Clone)]
pub struct CriticSample {
    pub goal: Theorem,
    /// Visit-weighted value estimate at harvest time.
    pub q_estimate: f64,
    pub solved: bool,
    /// Known unprovable (killed) at harvest time.
    pub bad: bool,
    /// The critic's own `log_critic` for this goal, for comparison.
    pub critic: f64,
    pub visit_count: u64,
}

/// One policy training sample: which tactics deserved the search's mass?
#[derive(Debug, Clone)]
pub struct TacticSample {
    pub goal: Theorem,
    pub tactics: Vec<Tactic>,
    /// Backup-derived policy target. Solved goals get a one-hot vector
    /// on the chosen proving edge, `0.0` on other proving edges, and the
    /// `-1.0` sentinel on edges irrelevant to the proof; unsolved goals
    /// get visit-count shares.
    pub target_pi: Vec<f64>,
    pub inproof: InProof,
    /// Per-tactic Q estimates; empty unless q-conditioning is on.
    pub q_estimates: Vec<f64>,
    pub visit_count: u64,
}

/// Aggregate counters describing the finished search.
#[derive(Debug, Clone)]
pub struct SearchMetadata {
    /// Unique string of the root goal this search ran on.
    pub root_goal: String,
    pub total_nodes: usize,
    pub expanded_nodes: usize,
    pub solved_nodes: u64,
    pub batches: u64,
    pub expansions_applied: u64,
    pub termination: TerminationReason,
    pub proven: bool,
}

/// Everything a terminal search hands back to its caller.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub critic_samples: Vec<CriticSample>,
    pub tactic_samples: Vec<TacticSample>,
    /// Observed transitions, deduplicated by (goal, tactic, children).
    pub effect_samples: Vec<EnvEffect>,
    /// The tactic samples lying on the minimal proof tree.
    pub proof_samples_tactics: Vec<TacticSample>,
    pub proof: Option<ProofTree>,
    pub metadata: SearchMetadata,
}

/// Deterministic keep/drop gate for a sample at the given rate.
fn gate(kind: &str, key: &str, rate: f64) -> bool {
    let payload = format!("{kind}|{key}");
    canonical_hash(DOMAIN_SAMPLE_GATE, payload.as_bytes()).unit_fraction() < rate
}

/// Harvest a terminal driver. Called by [`Htps::get_result`] only.
pub(crate) fn harvest(htps: &mut Htps, termination: TerminationReason) -> SearchResult {
    // Refresh proof membership; clears stale flags when unproven.
    let proof = if htps.graph.root_solved() {
        proof::minimal_proof(&mut htps.graph, htps.params.metric)
    } else {
        proof::mark_in_proof(&mut htps.graph);
        None
    };

    let mut critic_samples = Vec::new();
    let mut tactic_samples = Vec::new();
    let mut expanded_nodes = 0usize;

    let ids: Vec<NodeId> = htps.graph.iter().map(|(id, _)| id).collect();
    for id in ids {
        let node = htps.graph.node(id);
        if node.is_expanded() {
            expanded_nodes += 1;
        }

        if let Some(log_critic) = node.log_critic {
            if node.visit_count > 0
                && gate(
                    "critic",
                    &node.theorem.unique_string,
                    htps.params.critic_subsampling_rate,
                )
            {
                critic_samples.push(CriticSample {
                    goal: node.theorem.clone(),
                    q_estimate: value::node_estimate(&htps.graph, &htps.params, id),
                    solved: node.solved,
                    bad: node.killed,
                    critic: log_critic,
                    visit_count: node.visit_count,
                });
            }
        }

        if let Some(sample) = tactic_sample(htps, id) {
            tactic_samples.push(sample);
        }
    }

    let mut effect_samples = Vec::new();
    let mut seen_effects = HashSet::new();
    for effect in &htps.observed_effects {
        let key = effect.dedup_key();
        if !seen_effects.insert(key.clone()) {
            continue;
        }
        if gate("effect", key.as_str(), htps.params.effect_subsampling_rate) {
            effect_samples.push(effect.clone());
        }
    }

    let proof_samples_tactics: Vec<TacticSample> = tactic_samples
        .iter()
        .filter(|s| s.inproof == InProof::InMinimalProof)
        .cloned()
        .collect();

    let root = htps.graph.root();
    let metadata = SearchMetadata {
        root_goal: htps.graph.node(root).theorem.unique_string.clone(),
        total_nodes: htps.graph.len(),
        expanded_nodes,
        solved_nodes: htps.graph.solved_count(),
        batches: htps.batches,
        expansions_applied: htps.expansions_applied,
        termination,
        proven: htps.graph.root_solved(),
    };

    SearchResult {
        critic_samples,
        tactic_samples,
        effect_samples,
        proof_samples_tactics,
        proof,
        metadata,
    }
}

/// Build the policy sample for one node, if it qualifies: at least one
/// non-cycle edge, and either solved or carrying visit mass.
#[allow(clippy::cast_precision_loss)]
fn tactic_sample(htps: &Htps, id: NodeId) -> Option<TacticSample> {
    let node = htps.graph.node(id);
    let candidate_edges: Vec<usize> = (0..node.edges.len())
        .filter(|&e| !node.edges[e].cycle_masked)
        .collect();
    if candidate_edges.is_empty() {
        return None;
    }

    let inproof = if node.in_minimal_proof {
        InProof::InMinimalProof
    } else if node.in_proof {
        InProof::InProof
    } else {
        InProof::NotInProof
    };

    let kept: Vec<usize>;
    let target_pi: Vec<f64>;
    if node.solved {
        let chosen = node.minimal_edge.or_else(|| {
            candidate_edges
                .iter()
                .copied()
                .find(|&e| htps.graph.edge_solved(id, e))
        })?;
        if htps.params.only_learn_best_tactics {
            kept = vec![chosen];
            target_pi = vec![1.0];
        } else {
            kept = candidate_edges;
            target_pi = kept
                .iter()
                .map(|&e| {
                    if e == chosen {
                        1.0
                    } else if htps.graph.edge_solved(id, e) {
                        0.0
                    } else {
                        -1.0
                    }
                })
                .collect();
        }
    } else {
        let total: u64 = candidate_edges.iter().map(|&e| node.edges[e].n).sum();
        if total == 0 {
            return None;
        }
        let shares: Vec<(usize, f64)> = candidate_edges
            .iter()
            .map(|&e| (e, node.edges[e].n as f64 / total as f64))
            .collect();
        let surviving: Vec<(usize, f64)> = shares
            .into_iter()
            .filter(|&(_, pi)| pi >= htps.params.tactic_p_threshold)
            .collect();
        if surviving.is_empty() {
            return None;
        }
        let mass: f64 = surviving.iter().map(|(_, pi)| pi).sum();
        kept = surviving.iter().map(|&(e, _)| e).collect();
        target_pi = surviving.iter().map(|&(_, pi)| pi / mass).collect();
    }

    let q_estimates: Vec<f64> = if htps.params.tactic_sample_q_conditioning {
        kept.iter()
            .map(|&e| {
                let edge = &node.edges[e];
                if edge.n > 0 {
                    (edge.w / edge.n as f64).clamp(0.0, 1.0)
                } else {
                    0.0
                }
            })
            .collect()
    } else {
        Vec::new()
    };

    Some(TacticSample {
        goal: node.theorem.clone(),
        tactics: kept.iter().map(|&e| node.edges[e].tactic.clone()).collect(),
        target_pi,
        inproof,
        q_estimates,
        visit_count: node.visit_count,
    })
}
