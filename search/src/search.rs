//! The HTPS driver: batched selection, expansion intake, and backup.
//!
//! One search instance owns one root goal. The caller alternates between
//! [`Htps::theorems_to_expand`] (which descends from the root and
//! returns unexpanded leaves, charging virtual loss along each path) and
//! [`Htps::expand_and_backup`] (which ingests oracle expansions and
//! backs statistics up the recorded paths). All state transitions happen
//! inside those two calls; the core never suspends or spawns threads.
//!
//! Once a termination condition fires the driver is idempotent: further
//! calls are no-ops and [`Htps::get_result`] becomes available.

use std::collections::{HashMap, HashSet};

use hypertree_kernel::env::{EnvEffect, EnvExpansion, ExpansionOutcome};
use hypertree_kernel::lang::Theorem;

use crate::error::SearchError;
use crate::graph::{HyperGraph, NodeId};
use crate::params::{NodeMask, SearchParams};
use crate::proof;
use crate::samples::{self, SearchResult};
use crate::value;

/// Why a search reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The root goal is proved.
    RootSolved,
    /// The root is terminal without a proof: every continuation is a
    /// cycle or runs through an unprovable subgoal.
    RootUnprovable,
    /// The same leaf kept being selected without progress.
    Stuck,
    /// Some goal (not the root) was solved and the search was configured
    /// to stop at the first solve.
    AnySolved,
}

/// Stable tag string for snapshots and artifacts.
#[must_use]
pub fn termination_str(t: TerminationReason) -> &'static str {
    match t {
        TerminationReason::RootSolved => "root_solved",
        TerminationReason::RootUnprovable => "root_unprovable",
        TerminationReason::Stuck => "stuck",
        TerminationReason::AnySolved => "any_solved",
    }
}

pub(crate) fn parse_termination(s: &str) -> Option<TerminationReason> {
    match s {
        "root_solved" => Some(TerminationReason::RootSolved),
        "root_unprovable" => Some(TerminationReason::RootUnprovable),
        "stuck" => Some(TerminationReason::Stuck),
        "any_solved" => Some(TerminationReason::AnySolved),
        _ => None,
    }
}

/// Edges traversed by one descent, root-first.
type DescentPath = Vec<(NodeId, usize)>;

/// Outcome of a single root-to-leaf descent.
enum Descent {
    /// Reached an unexpanded leaf; the recorded path carries virtual loss.
    Leaf(NodeId, DescentPath),
    /// A termination condition fired during the descent.
    Terminated,
    /// No selectable leaf this round (masks, cycles, or exhaustion).
    Blocked,
}

/// A batched HyperTree proof search over one root goal.
pub struct Htps {
    pub(crate) graph: HyperGraph,
    pub(crate) params: SearchParams,
    pub(crate) terminal: Option<TerminationReason>,
    /// Descent paths awaiting their expansion, keyed by leaf unique
    /// string. Multiple descents may be pending for one leaf.
    in_flight: HashMap<String, Vec<DescentPath>>,
    first_batch_done: bool,
    /// `(leaf, consecutive selections)` for stuck detection.
    stuck_leaf: Option<(String, u32)>,
    pub(crate) batches: u64,
    pub(crate) expansions_applied: u64,
    pub(crate) observed_effects: Vec<EnvEffect>,
}

impl Htps {
    /// Start a search on `root` with validated parameters.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidParams`] when a parameter is out of
    /// range.
    pub fn new(root: Theorem, params: SearchParams) -> Result<Self, SearchError> {
        params.validate()?;
        Ok(Self {
            graph: HyperGraph::new(root),
            params,
            terminal: None,
            in_flight: HashMap::new(),
            first_batch_done: false,
            stuck_leaf: None,
            batches: 0,
            expansions_applied: 0,
            observed_effects: Vec::new(),
        })
    }

    /// Reassemble a driver from restored parts (snapshot decode).
    pub(crate) fn from_parts(
        graph: HyperGraph,
        params: SearchParams,
        terminal: Option<TerminationReason>,
        observed_effects: Vec<EnvEffect>,
        batches: u64,
        expansions_applied: u64,
    ) -> Self {
        Self {
            graph,
            params,
            terminal,
            in_flight: HashMap::new(),
            first_batch_done: false,
            stuck_leaf: None,
            batches,
            expansions_applied,
            observed_effects,
        }
    }

    #[must_use]
    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    #[must_use]
    pub fn graph(&self) -> &HyperGraph {
        &self.graph
    }

    /// Is the root goal proved?
    #[must_use]
    pub fn proven(&self) -> bool {
        self.graph.root_solved()
    }

    /// Has the search reached a terminal state?
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.terminal.is_some()
    }

    /// Why the search terminated, once it has.
    #[must_use]
    pub fn termination(&self) -> Option<TerminationReason> {
        self.terminal
    }

    /// Select up to the batch budget of unexpanded leaves, charging
    /// virtual loss along every descent path.
    ///
    /// Returns an empty batch when the search is (or just became)
    /// terminal, or when every descent is currently blocked and the
    /// caller still owes expansions for earlier leaves.
    pub fn theorems_to_expand(&mut self) -> Vec<Theorem> {
        if self.terminal.is_some() {
            return Vec::new();
        }
        self.refresh_mask_flags();
        if self.graph.root_solved() && self.params.early_stopping {
            self.terminal = Some(TerminationReason::RootSolved);
            return Vec::new();
        }
        if self.graph.root_killed() {
            self.terminal = Some(TerminationReason::RootUnprovable);
            return Vec::new();
        }

        let limit = if self.first_batch_done {
            self.params.succ_expansions
        } else {
            self.params.num_expansions
        };
        self.first_batch_done = true;

        let mut batch: Vec<Theorem> = Vec::new();
        let mut batch_keys: HashSet<String> = HashSet::new();
        for _ in 0..limit {
            match self.descend() {
                Descent::Leaf(leaf, path) => {
                    let unique = self.graph.node(leaf).theorem.unique_string.clone();
                    if batch_keys.contains(&unique) {
                        // Virtual loss could not divert the descent away
                        // from a leaf already in this batch; no further
                        // leaf can be found this call.
                        self.unwind(&path);
                        break;
                    }
                    // A leaf re-returned call after call (because its
                    // expansion never arrives or never helps) trips the
                    // stuck detector.
                    let repeats = match &mut self.stuck_leaf {
                        Some((last, count)) if *last == unique => {
                            *count += 1;
                            *count
                        }
                        slot => {
                            *slot = Some((unique.clone(), 1));
                            1
                        }
                    };
                    self.in_flight.entry(unique.clone()).or_default().push(path);
                    batch_keys.insert(unique);
                    batch.push(self.graph.node(leaf).theorem.clone());
                    if repeats >= self.params.count_threshold {
                        self.terminal = Some(TerminationReason::Stuck);
                        break;
                    }
                }
                Descent::Terminated => break,
                Descent::Blocked => break,
            }
        }

        if batch.is_empty() && self.in_flight.is_empty() && self.terminal.is_none() {
            // Nothing selectable and nothing owed: the search cannot
            // make progress anymore.
            self.terminal = Some(if self.graph.root_solved() {
                TerminationReason::RootSolved
            } else {
                TerminationReason::RootUnprovable
            });
        }
        batch
    }

    /// Ingest one batch of oracle expansions and back statistics up the
    /// recorded descent paths.
    ///
    /// No-op once terminal; a batch whose targets are already expanded
    /// leaves the graph untouched (its paths were consumed by the first
    /// submission), so double submission is safe.
    pub fn expand_and_backup(&mut self, expansions: &[EnvExpansion]) {
        if self.terminal.is_some() {
            return;
        }
        // `backup_once` dedup scope is exactly one backup pass.
        let mut backed: HashSet<(NodeId, usize)> = HashSet::new();
        for expansion in expansions {
            let applied = self.graph.add_expansion(expansion);
            if applied {
                self.expansions_applied += 1;
                if let ExpansionOutcome::Proposals(p) = &expansion.outcome {
                    self.observed_effects.extend(p.effects.iter().cloned());
                }
            }
            let unique = &expansion.thm.unique_string;
            let Some(paths) = self.in_flight.remove(unique) else {
                continue;
            };
            // The node exists: add_expansion interned it.
            let Some(leaf) = self.graph.id_of(unique) else {
                continue;
            };
            for path in paths {
                self.backup(leaf, &path, &mut backed);
            }
        }
        self.batches += 1;
        self.check_termination();
    }

    /// Harvest the terminal search: samples, minimal proof, metadata.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::ResultNotReady`] before the search is done.
    pub fn get_result(&mut self) -> Result<SearchResult, SearchError> {
        let Some(reason) = self.terminal else {
            return Err(SearchError::ResultNotReady);
        };
        Ok(samples::harvest(self, reason))
    }

    fn descend(&mut self) -> Descent {
        let root = self.graph.root();
        let mut cur = root;
        let mut path: DescentPath = Vec::new();
        let mut on_path: HashSet<NodeId> = HashSet::new();
        loop {
            if self.graph.node(cur).killed {
                if cur == root {
                    self.terminal = Some(TerminationReason::RootUnprovable);
                    return Descent::Terminated;
                }
                self.unwind(&path);
                return Descent::Blocked;
            }
            if !self.graph.node(cur).is_expanded() {
                return Descent::Leaf(cur, path);
            }
            on_path.insert(cur);
            let Some(edge_idx) = value::select_edge(&self.graph, &self.params, cur, &on_path)
            else {
                // Statically exhausted nodes become unprovable; a purely
                // path-local block just abandons this descent.
                let statically_dead = self
                    .graph
                    .node(cur)
                    .edges
                    .iter()
                    .all(|e| e.dead || e.cycle_masked);
                if statically_dead && !self.graph.node(cur).solved {
                    self.graph.kill(cur);
                }
                self.unwind(&path);
                if self.graph.root_killed() {
                    self.terminal = Some(TerminationReason::RootUnprovable);
                    return Descent::Terminated;
                }
                return Descent::Blocked;
            };
            let Some(child) =
                value::pick_child(&self.graph, &self.params, cur, edge_idx, &on_path)
            else {
                self.unwind(&path);
                return Descent::Blocked;
            };
            self.graph.node_mut(cur).edges[edge_idx].virtual_count += 1;
            path.push((cur, edge_idx));
            cur = child;
        }
    }

    /// Reverse the virtual loss charged along an abandoned path.
    fn unwind(&mut self, path: &[(NodeId, usize)]) {
        for &(id, edge_idx) in path {
            let edge = &mut self.graph.node_mut(id).edges[edge_idx];
            edge.virtual_count = edge.virtual_count.saturating_sub(1);
        }
    }

    /// Back one descent path up from its leaf, reversing virtual loss
    /// and adding true visits with the AND-product value rule.
    fn backup(&mut self, leaf: NodeId, path: &[(NodeId, usize)], backed: &mut HashSet<(NodeId, usize)>) {
        let leaf_fresh = backed.insert((leaf, usize::MAX));
        if !self.params.backup_once || leaf_fresh {
            self.graph.node_mut(leaf).visit_count += 1;
        }
        for &(id, edge_idx) in path.iter().rev() {
            let edge = &mut self.graph.node_mut(id).edges[edge_idx];
            edge.virtual_count = edge.virtual_count.saturating_sub(1);
            let fresh = backed.insert((id, edge_idx));
            if self.params.backup_once && !fresh {
                continue;
            }
            let value = if self.params.backup_one_for_solved && self.graph.edge_solved(id, edge_idx)
            {
                1.0
            } else {
                value::edge_value(&self.graph, &self.params, id, edge_idx)
            };
            let edge = &mut self.graph.node_mut(id).edges[edge_idx];
            edge.w += value;
            edge.n += 1;
            self.graph.node_mut(id).visit_count += 1;
        }
    }

    fn check_termination(&mut self) {
        if self.terminal.is_some() {
            return;
        }
        if self.graph.root_solved() && self.params.early_stopping {
            self.terminal = Some(TerminationReason::RootSolved);
        } else if self.graph.root_killed() {
            self.terminal = Some(TerminationReason::RootUnprovable);
        } else if self.params.early_stopping_solved_if_root_not_proven
            && self.graph.solved_count() > 0
        {
            self.terminal = Some(if self.graph.root_solved() {
                TerminationReason::RootSolved
            } else {
                TerminationReason::AnySolved
            });
        }
    }

    /// Proof-family masks need fresh membership flags once the root is
    /// solved and the search keeps running.
    fn refresh_mask_flags(&mut self) {
        let needs_flags = matches!(
            self.params.node_mask,
            NodeMask::Proof | NodeMask::MinimalProof | NodeMask::MinimalProofSolving
        );
        if needs_flags && self.graph.root_solved() {
            let _ = proof::minimal_proof(&mut self.graph, self.params.metric);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypertree_kernel::env::TacticProposals;
    use hypertree_kernel::lang::{Context, Tactic};

    fn goal(unique: &str) -> Theorem {
        Theorem::new("c", unique, vec![], Context::empty(), vec![])
    }

    fn proposals(
        target: &str,
        tactics: Vec<(&str, Vec<&str>, f64)>,
        log_critic: f64,
    ) -> EnvExpansion {
        let mut ts = Vec::new();
        let mut children = Vec::new();
        let mut priors = Vec::new();
        let mut effects = Vec::new();
        for (name, kids, prior) in tactics {
            let tactic = Tactic::new(name, true, 1);
            let kid_thms: Vec<Theorem> = kids.into_iter().map(goal).collect();
            effects.push(EnvEffect::new(goal(target), tactic.clone(), kid_thms.clone()));
            ts.push(tactic);
            children.push(kid_thms);
            priors.push(prior);
        }
        EnvExpansion::proposed(
            goal(target),
            0,
            0,
            vec![],
            TacticProposals {
                effects,
                log_critic,
                tactics: ts,
                children_for_tactic: children,
                priors,
            },
        )
        .unwrap()
    }

    #[test]
    fn first_batch_is_the_root() {
        let mut h = Htps::new(goal("r"), SearchParams::default()).unwrap();
        let batch = h.theorems_to_expand();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].unique_string, "r");
        assert!(!h.is_done());
    }

    #[test]
    fn trivial_proof_terminates_proven() {
        let mut h = Htps::new(goal("r"), SearchParams::default()).unwrap();
        let _ = h.theorems_to_expand();
        h.expand_and_backup(&[proposals("r", vec![("t1", vec![], 1.0)], 0.0)]);
        assert!(h.proven());
        assert!(h.is_done());
        assert_eq!(h.termination(), Some(TerminationReason::RootSolved));
    }

    #[test]
    fn two_step_proof_descends_to_the_subgoal() {
        let mut h = Htps::new(goal("r"), SearchParams::default()).unwrap();
        let _ = h.theorems_to_expand();
        h.expand_and_backup(&[proposals("r", vec![("tA", vec!["a"], 1.0)], -0.5)]);
        assert!(!h.is_done());
        let batch = h.theorems_to_expand();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].unique_string, "a");
        h.expand_and_backup(&[proposals("a", vec![("tA2", vec![], 1.0)], -0.1)]);
        assert!(h.proven());
        assert!(h.is_done());
    }

    #[test]
    fn virtual_loss_is_fully_reversed_by_backup() {
        let mut h = Htps::new(goal("r"), SearchParams::default()).unwrap();
        let _ = h.theorems_to_expand();
        h.expand_and_backup(&[proposals("r", vec![("tA", vec!["a"], 1.0)], -0.5)]);
        let _ = h.theorems_to_expand();
        {
            let root = h.graph().root();
            assert_eq!(h.graph().node(root).edges[0].virtual_count, 1);
        }
        h.expand_and_backup(&[proposals("a", vec![("tA2", vec![], 1.0)], -0.1)]);
        let root = h.graph().root();
        assert_eq!(h.graph().node(root).edges[0].virtual_count, 0);
        assert_eq!(h.graph().node(root).edges[0].n, 1);
    }

    #[test]
    fn empty_backup_is_a_no_op() {
        let mut h = Htps::new(goal("r"), SearchParams::default()).unwrap();
        let _ = h.theorems_to_expand();
        h.expand_and_backup(&[proposals("r", vec![("tA", vec!["a"], 1.0)], -0.5)]);
        let before = h.graph().node(h.graph().root()).visit_count;
        h.expand_and_backup(&[]);
        assert_eq!(h.graph().node(h.graph().root()).visit_count, before);
        assert!(!h.is_done());
    }

    #[test]
    fn duplicate_batch_is_a_no_op() {
        let mut h = Htps::new(goal("r"), SearchParams::default()).unwrap();
        let _ = h.theorems_to_expand();
        let batch = vec![proposals("r", vec![("tA", vec!["a"], 1.0)], -0.5)];
        h.expand_and_backup(&batch);
        let visits = h.graph().node(h.graph().root()).visit_count;
        let edges = h.graph().node(h.graph().root()).edges.len();
        h.expand_and_backup(&batch);
        assert_eq!(h.graph().node(h.graph().root()).visit_count, visits);
        assert_eq!(h.graph().node(h.graph().root()).edges.len(), edges);
    }

    #[test]
    fn cycle_only_root_is_unprovable() {
        let mut h = Htps::new(goal("r"), SearchParams::default()).unwrap();
        let _ = h.theorems_to_expand();
        h.expand_and_backup(&[proposals("r", vec![("tC", vec!["r"], 1.0)], 0.0)]);
        assert!(h.is_done());
        assert!(!h.proven());
        assert_eq!(h.termination(), Some(TerminationReason::RootUnprovable));
    }

    #[test]
    fn dead_end_branch_falls_back_to_alternative() {
        let mut h = Htps::new(goal("r"), SearchParams::default()).unwrap();
        let _ = h.theorems_to_expand();
        h.expand_and_backup(&[proposals(
            "r",
            vec![("tA", vec!["a"], 0.5), ("tB", vec!["b"], 0.5)],
            -0.5,
        )]);
        // Expand both leaves: `a` solves, `b` errors.
        let mut pending = h.theorems_to_expand();
        while !pending.is_empty() {
            let batch: Vec<EnvExpansion> = pending
                .iter()
                .map(|t| match t.unique_string.as_str() {
                    "a" => proposals("a", vec![("ta", vec![], 1.0)], -0.1),
                    "b" => EnvExpansion::errored(goal("b"), "dead end"),
                    other => proposals(other, vec![("t", vec![], 1.0)], 0.0),
                })
                .collect();
            h.expand_and_backup(&batch);
            if h.is_done() {
                break;
            }
            pending = h.theorems_to_expand();
        }
        assert!(h.proven());
    }

    #[test]
    fn terminal_driver_ignores_further_batches() {
        let mut h = Htps::new(goal("r"), SearchParams::default()).unwrap();
        let _ = h.theorems_to_expand();
        h.expand_and_backup(&[proposals("r", vec![("t1", vec![], 1.0)], 0.0)]);
        assert!(h.is_done());
        let visits = h.graph().node(h.graph().root()).visit_count;
        h.expand_and_backup(&[proposals("zzz", vec![("t", vec![], 1.0)], 0.0)]);
        assert!(h.graph().id_of("zzz").is_none());
        assert_eq!(h.graph().node(h.graph().root()).visit_count, visits);
        assert!(h.theorems_to_expand().is_empty());
    }

    #[test]
    fn get_result_before_done_is_an_error() {
        let mut h = Htps::new(goal("r"), SearchParams::default()).unwrap();
        let _ = h.theorems_to_expand();
        assert!(matches!(h.get_result(), Err(SearchError::ResultNotReady)));
    }

    #[test]
    fn stuck_detection_fires_on_repeated_leaf() {
        let params = SearchParams {
            count_threshold: 3,
            ..SearchParams::default()
        };
        let mut h = Htps::new(goal("r"), params).unwrap();
        let _ = h.theorems_to_expand();
        h.expand_and_backup(&[proposals("r", vec![("tA", vec!["a"], 1.0)], -0.5)]);
        // The caller keeps asking without ever supplying the expansion
        // for `a`; the same leaf comes back until the stuck detector
        // terminates the search.
        for _ in 0..3 {
            assert!(!h.is_done());
            let batch = h.theorems_to_expand();
            assert_eq!(batch.len(), 1);
            assert_eq!(batch[0].unique_string, "a");
        }
        assert!(h.is_done());
        assert_eq!(h.termination(), Some(TerminationReason::Stuck));
    }

    #[test]
    fn invalid_params_rejected_at_construction() {
        let params = SearchParams {
            policy_temperature: 0.0,
            ..SearchParams::default()
        };
        assert!(Htps::new(goal("r"), params).is_err());
    }

    #[test]
    fn early_stop_on_any_solved() {
        let params = SearchParams {
            early_stopping_solved_if_root_not_proven: true,
            ..SearchParams::default()
        };
        let mut h = Htps::new(goal("r"), params).unwrap();
        let _ = h.theorems_to_expand();
        // Root needs both `a` and an unexpandable `hard`; solving `a`
        // alone triggers the any-solved stop.
        h.expand_and_backup(&[proposals("r", vec![("t", vec!["a", "hard"], 1.0)], -0.5)]);
        let mut guard = 0;
        while !h.is_done() && guard < 10 {
            let pending = h.theorems_to_expand();
            if h.is_done() || pending.is_empty() {
                break;
            }
            let batch: Vec<EnvExpansion> = pending
                .iter()
                .filter(|t| t.unique_string == "a")
                .map(|_| proposals("a", vec![("ta", vec![], 1.0)], -0.1))
                .collect();
            h.expand_and_backup(&batch);
            guard += 1;
        }
        assert!(h.is_done());
        assert_eq!(h.termination(), Some(TerminationReason::AnySolved));
    }
}
