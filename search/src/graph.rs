//! The proof hypergraph: interned node store with tactic hyperedges.
//!
//! Nodes live in an arena indexed by [`NodeId`] and are interned by
//! `theorem.unique_string` — at most one node per unique string for the
//! life of the search. Edges carry child-ID multisets in insertion
//! order (AND-semantics: every occurrence must be proved). Parent
//! back-references are a separate multimap, never owning.
//!
//! Solved and killed status flow through the parent multimap by
//! breadth-first worklist: "provable" is a monotone lattice value
//! (`Unknown ⊑ Solved`, `Unknown ⊑ Impossible`), so propagation handles
//! cycles without ad-hoc recursion.

use std::collections::{HashMap, HashSet, VecDeque};

use hypertree_kernel::env::{EnvExpansion, ExpansionOutcome};
use hypertree_kernel::lang::{Tactic, Theorem};

/// Stable arena index of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Expansion lifecycle of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionState {
    /// Never handed to the oracle; a selectable leaf.
    Unexpanded,
    /// Expanded with at least one surviving hyperedge.
    Expanded,
    /// Expanded but unusable; the node is terminal with this error.
    Errored(String),
}

/// One surviving tactic at a node, with its accumulated statistics.
#[derive(Debug, Clone)]
pub struct HyperEdge {
    pub tactic: Tactic,
    /// Policy prior as reported by the model (before any dedup loss).
    pub prior: f64,
    /// Child multiset, insertion order preserved.
    pub children: Vec<NodeId>,
    /// Summed backed-up value.
    pub w: f64,
    /// True visit count.
    pub n: u64,
    /// In-flight selections not yet backed up.
    pub virtual_count: u64,
    /// Masked from selection: some child reaches back to the owner.
    pub cycle_masked: bool,
    /// Some child is known unprovable; the edge can never close.
    pub dead: bool,
}

impl HyperEdge {
    /// Visits including in-flight virtual ones.
    #[must_use]
    pub fn visits(&self) -> u64 {
        self.n + self.virtual_count
    }
}

/// A theorem node and its hyperedges.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub theorem: Theorem,
    pub expansion: ExpansionState,
    pub edges: Vec<HyperEdge>,
    /// Critic estimate recorded at expansion; `None` until then.
    pub log_critic: Option<f64>,
    /// Times a backup pass went through this node (leaf visits included).
    pub visit_count: u64,
    pub solved: bool,
    /// Terminal without being solved: every continuation is a cycle or
    /// leads through an unprovable child.
    pub killed: bool,
    /// Sum of the priors of surviving edges; scorers normalize by it.
    pub prior_mass: f64,
    /// Lies in some proof of the root (set once the root is solved).
    pub in_proof: bool,
    /// Lies in the minimal proof of the root.
    pub in_minimal_proof: bool,
    /// Edge chosen by the last minimal-proof extraction.
    pub minimal_edge: Option<usize>,
}

impl GraphNode {
    fn new(theorem: Theorem) -> Self {
        Self {
            theorem,
            expansion: ExpansionState::Unexpanded,
            edges: Vec::new(),
            log_critic: None,
            visit_count: 0,
            solved: false,
            killed: false,
            prior_mass: 0.0,
            in_proof: false,
            in_minimal_proof: false,
            minimal_edge: None,
        }
    }

    /// Expanded or errored; either way no longer a selectable leaf.
    #[must_use]
    pub fn is_expanded(&self) -> bool {
        !matches!(self.expansion, ExpansionState::Unexpanded)
    }

    /// The attached environment error, if the expansion failed.
    #[must_use]
    pub fn expansion_error(&self) -> Option<&str> {
        match &self.expansion {
            ExpansionState::Errored(e) => Some(e),
            _ => None,
        }
    }
}

/// The hypergraph store.
#[derive(Debug, Clone)]
pub struct HyperGraph {
    nodes: Vec<GraphNode>,
    /// `parents[child] = [(parent, edge_idx), ...]` — one entry per
    /// occurrence of the child in the parent's edge multiset.
    parents: Vec<Vec<(NodeId, usize)>>,
    index: HashMap<String, NodeId>,
    root: NodeId,
    solved_count: u64,
}

impl HyperGraph {
    /// Create a store holding only the root goal.
    #[must_use]
    pub fn new(root: Theorem) -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            parents: Vec::new(),
            index: HashMap::new(),
            root: NodeId(0),
            solved_count: 0,
        };
        graph.root = graph.get_or_create(root);
        graph
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut GraphNode {
        &mut self.nodes[id.index()]
    }

    /// Look up a node by its theorem's unique string.
    #[must_use]
    pub fn id_of(&self, unique_string: &str) -> Option<NodeId> {
        self.index.get(unique_string).copied()
    }

    /// Iterate nodes in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &GraphNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Number of solved nodes.
    #[must_use]
    pub fn solved_count(&self) -> u64 {
        self.solved_count
    }

    #[must_use]
    pub fn root_solved(&self) -> bool {
        self.node(self.root).solved
    }

    #[must_use]
    pub fn root_killed(&self) -> bool {
        self.node(self.root).killed
    }

    /// Intern a theorem, returning the existing node when the unique
    /// string is already known.
    ///
    /// The first-seen theorem payload wins; only the caller-owned
    /// metadata is refreshed to the last observation.
    pub fn get_or_create(&mut self, theorem: Theorem) -> NodeId {
        if let Some(&id) = self.index.get(&theorem.unique_string) {
            self.nodes[id.index()].theorem.metadata = theorem.metadata;
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.index.insert(theorem.unique_string.clone(), id);
        self.nodes.push(GraphNode::new(theorem));
        self.parents.push(Vec::new());
        id
    }

    /// All children of the edge are solved (vacuously true when empty).
    #[must_use]
    pub fn edge_solved(&self, id: NodeId, edge_idx: usize) -> bool {
        self.node(id).edges[edge_idx]
            .children
            .iter()
            .all(|&c| self.node(c).solved)
    }

    /// Apply one oracle expansion, transitioning the target node from
    /// unexpanded to expanded (or errored). Returns `false` when the
    /// node was already expanded — re-submitting a batch is a no-op.
    pub fn add_expansion(&mut self, expansion: &EnvExpansion) -> bool {
        let id = self.get_or_create(expansion.thm.clone());
        if self.node(id).is_expanded() {
            return false;
        }
        match &expansion.outcome {
            ExpansionOutcome::Failure { error } => {
                self.node_mut(id).expansion = ExpansionState::Errored(error.clone());
                self.kill(id);
            }
            ExpansionOutcome::Proposals(p) => {
                let mut seen: HashSet<&str> = HashSet::new();
                let mut staged: Vec<(Tactic, Vec<Theorem>, f64)> = Vec::new();
                for (i, tactic) in p.tactics.iter().enumerate() {
                    if !tactic.is_valid {
                        continue;
                    }
                    if !seen.insert(tactic.unique_string.as_str()) {
                        continue;
                    }
                    staged.push((
                        tactic.clone(),
                        p.children_for_tactic[i].clone(),
                        p.priors[i],
                    ));
                }
                if staged.is_empty() {
                    self.node_mut(id).expansion =
                        ExpansionState::Errored("no usable tactics".to_string());
                    self.kill(id);
                    return true;
                }

                // Ancestor projection for the static cycle mask. Edges to
                // later-added ancestors are caught dynamically during
                // descent instead.
                let ancestors = self.ancestors(id);

                let mut prior_mass = 0.0;
                for (tactic, children, prior) in staged {
                    let child_ids: Vec<NodeId> = children
                        .into_iter()
                        .map(|c| self.get_or_create(c))
                        .collect();
                    let cycle_masked = child_ids
                        .iter()
                        .any(|&c| c == id || ancestors.contains(&c));
                    let dead = child_ids.iter().any(|&c| self.node(c).killed);
                    let edge_idx = self.node(id).edges.len();
                    for &c in &child_ids {
                        self.parents[c.index()].push((id, edge_idx));
                    }
                    prior_mass += prior;
                    self.node_mut(id).edges.push(HyperEdge {
                        tactic,
                        prior,
                        children: child_ids,
                        w: 0.0,
                        n: 0,
                        virtual_count: 0,
                        cycle_masked,
                        dead,
                    });
                }

                let node = self.node_mut(id);
                node.expansion = ExpansionState::Expanded;
                node.log_critic = Some(p.log_critic);
                node.prior_mass = prior_mass;

                let edge_count = self.node(id).edges.len();
                if (0..edge_count).any(|e| self.edge_solved(id, e)) {
                    self.solve(id);
                } else if self
                    .node(id)
                    .edges
                    .iter()
                    .all(|e| e.dead || e.cycle_masked)
                {
                    self.kill(id);
                }
            }
        }
        true
    }

    /// Mark a node solved and propagate to fixed point: a parent becomes
    /// solved when some edge now has all-solved children. Monotone.
    pub(crate) fn solve(&mut self, id: NodeId) {
        if self.node(id).solved {
            return;
        }
        self.node_mut(id).solved = true;
        self.solved_count += 1;
        let mut queue = VecDeque::from([id]);
        while let Some(cur) = queue.pop_front() {
            for (parent, edge_idx) in self.parents[cur.index()].clone() {
                if self.node(parent).solved {
                    continue;
                }
                if self.edge_solved(parent, edge_idx) {
                    self.node_mut(parent).solved = true;
                    self.solved_count += 1;
                    queue.push_back(parent);
                }
            }
        }
    }

    /// Mark a node unprovable and propagate the dual way: every edge
    /// through it dies, and a parent with no live edges left dies too.
    /// Solved status wins over killed and is never revoked.
    pub(crate) fn kill(&mut self, id: NodeId) {
        if self.node(id).killed || self.node(id).solved {
            return;
        }
        self.node_mut(id).killed = true;
        let mut queue = VecDeque::from([id]);
        while let Some(cur) = queue.pop_front() {
            for (parent, edge_idx) in self.parents[cur.index()].clone() {
                self.node_mut(parent).edges[edge_idx].dead = true;
                let p = self.node(parent);
                if p.killed || p.solved || !p.is_expanded() {
                    continue;
                }
                if p.edges.iter().all(|e| e.dead || e.cycle_masked) {
                    self.node_mut(parent).killed = true;
                    queue.push_back(parent);
                }
            }
        }
    }

    /// Transitive parents of a node (the node itself excluded).
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> HashSet<NodeId> {
        let mut out = HashSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(cur) = queue.pop_front() {
            for &(parent, _) in &self.parents[cur.index()] {
                if out.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        out.remove(&id);
        out
    }

    /// Restore a solved/killed pair from a snapshot, keeping the solved
    /// counter consistent. Runs before edges are restored.
    pub(crate) fn restore_status(&mut self, id: NodeId, solved: bool, killed: bool) {
        if solved && !self.node(id).solved {
            self.node_mut(id).solved = true;
            self.solved_count += 1;
        }
        self.node_mut(id).killed = killed;
    }

    /// Re-attach one edge with its accumulated statistics (snapshot
    /// decode only). Child kill flags must already be restored so the
    /// dead mark can be recomputed rather than trusted.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore_edge(
        &mut self,
        id: NodeId,
        tactic: Tactic,
        prior: f64,
        children: Vec<NodeId>,
        n: u64,
        w: f64,
        cycle_masked: bool,
    ) {
        let dead = children.iter().any(|&c| self.node(c).killed);
        let edge_idx = self.node(id).edges.len();
        for &c in &children {
            self.parents[c.index()].push((id, edge_idx));
        }
        self.node_mut(id).edges.push(HyperEdge {
            tactic,
            prior,
            children,
            w,
            n,
            virtual_count: 0,
            cycle_masked,
            dead,
        });
    }
}
