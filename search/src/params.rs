//! Search configuration.

use crate::error::SearchError;

/// Which policy scorer drives edge selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyType {
    /// `Q + c_puct · prior · sqrt(N_parent) / (1 + N_edge)`.
    AlphaZero,
    /// Regularized policy optimization: rank by `prior · exp(Q/τ)`
    /// normalized across the parent, select the edge maximizing
    /// `π_e − N_e / (1 + N_parent)`.
    Rpo,
    /// Pure exploration while the parent is unvisited, raw Q afterwards.
    Other,
}

/// How a solved child contributes to its parent's Q estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QValueSolved {
    /// Value 1, ignoring the depth penalty.
    One,
    /// `1 / (1 + N)` — solved subtrees repel further visits.
    OneOverCounts,
    /// `N / (1 + N)` — solved subtrees keep attracting visits.
    CountOverCounts,
    /// Fall through to the node's ordinary estimate.
    None,
}

/// Which cost the minimal-proof extraction minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Sum of tactic durations over the proof tree.
    Time,
    /// Proof tree depth.
    Depth,
    /// Number of distinct goals in the proof tree.
    Size,
}

/// Restricts which nodes descents may pass through or land on.
///
/// The proof-family masks only bite once the root is solved (before any
/// proof exists they degrade: `Proof` and `MinimalProof` to [`NoMask`],
/// `MinimalProofSolving` to [`Solving`]), so a search configured with
/// them can still make progress from the first batch.
///
/// [`NoMask`]: NodeMask::NoMask
/// [`Solving`]: NodeMask::Solving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeMask {
    NoMask,
    /// Never descend into already-solved subtrees.
    Solving,
    /// Only descend within nodes lying in a proof of the root.
    Proof,
    /// Only descend within nodes lying in the minimal proof.
    MinimalProof,
    /// Minimal-proof restriction plus the solved-subtree exclusion.
    MinimalProofSolving,
}

/// Every knob of an HTPS search.
///
/// Validated once at construction; a driver never observes an illegal
/// configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// PUCT exploration constant (`c_puct`).
    pub exploration: f64,
    pub policy_type: PolicyType,
    /// Leaf budget for the first selection batch.
    pub num_expansions: usize,
    /// Leaf budget for every subsequent batch.
    pub succ_expansions: usize,
    /// Stop descending (and terminate) as soon as the root is solved.
    pub early_stopping: bool,
    /// Ignore critic estimates; unexpanded values use `tactic_init_value`.
    pub no_critic: bool,
    /// Update each `(node, edge)` at most once per backup pass.
    pub backup_once: bool,
    /// Back up value 1 through solved edges instead of the AND-product.
    pub backup_one_for_solved: bool,
    /// Per-edge value discount, in `(0, 1]`.
    pub depth_penalty: f64,
    /// Consecutive selections of one leaf before the search is stuck.
    pub count_threshold: u32,
    /// Drop tactic-sample entries below this policy mass.
    pub tactic_p_threshold: f64,
    /// Attach per-edge Q estimates to tactic samples.
    pub tactic_sample_q_conditioning: bool,
    /// Restrict solved tactic samples to their minimal edges.
    pub only_learn_best_tactics: bool,
    /// Default value of an unexpanded node, in `[0, 1]`.
    pub tactic_init_value: f64,
    pub q_value_solved: QValueSolved,
    /// RPO temperature τ; must be positive.
    pub policy_temperature: f64,
    pub metric: Metric,
    pub node_mask: NodeMask,
    /// Keep fraction for effect samples, in `[0, 1]`.
    pub effect_subsampling_rate: f64,
    /// Keep fraction for critic samples, in `[0, 1]`.
    pub critic_subsampling_rate: f64,
    /// Terminate once ANY node is solved (lower-bound searches).
    pub early_stopping_solved_if_root_not_proven: bool,
    /// Pessimistic stand-in subtracted per in-flight selection; ≥ 0.
    pub virtual_loss: f64,
}

impl SearchParams {
    /// Validate every range constraint.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidParams`] naming the offending field.
    pub fn validate(&self) -> Result<(), SearchError> {
        fn fail(detail: impl Into<String>) -> Result<(), SearchError> {
            Err(SearchError::InvalidParams {
                detail: detail.into(),
            })
        }

        if !self.exploration.is_finite() {
            return fail(format!("exploration must be finite, got {}", self.exploration));
        }
        if self.num_expansions == 0 {
            return fail("num_expansions must be at least 1");
        }
        if self.succ_expansions == 0 {
            return fail("succ_expansions must be at least 1");
        }
        if !(self.depth_penalty > 0.0 && self.depth_penalty <= 1.0) {
            return fail(format!(
                "depth_penalty must lie in (0, 1], got {}",
                self.depth_penalty
            ));
        }
        if self.count_threshold == 0 {
            return fail("count_threshold must be at least 1");
        }
        if !(self.policy_temperature.is_finite() && self.policy_temperature > 0.0) {
            return fail(format!(
                "policy_temperature must be positive, got {}",
                self.policy_temperature
            ));
        }
        if !(0.0..=1.0).contains(&self.tactic_init_value) {
            return fail(format!(
                "tactic_init_value must lie in [0, 1], got {}",
                self.tactic_init_value
            ));
        }
        for (name, rate) in [
            ("effect_subsampling_rate", self.effect_subsampling_rate),
            ("critic_subsampling_rate", self.critic_subsampling_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return fail(format!("{name} must lie in [0, 1], got {rate}"));
            }
        }
        if !(self.virtual_loss.is_finite() && self.virtual_loss >= 0.0) {
            return fail(format!(
                "virtual_loss must be nonnegative, got {}",
                self.virtual_loss
            ));
        }
        if !self.tactic_p_threshold.is_finite() || self.tactic_p_threshold < 0.0 {
            return fail(format!(
                "tactic_p_threshold must be nonnegative, got {}",
                self.tactic_p_threshold
            ));
        }
        Ok(())
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            exploration: 1.0,
            policy_type: PolicyType::AlphaZero,
            num_expansions: 16,
            succ_expansions: 8,
            early_stopping: true,
            no_critic: false,
            backup_once: false,
            backup_one_for_solved: false,
            depth_penalty: 0.99,
            count_threshold: 10,
            tactic_p_threshold: 0.0,
            tactic_sample_q_conditioning: false,
            only_learn_best_tactics: false,
            tactic_init_value: 0.5,
            q_value_solved: QValueSolved::One,
            policy_temperature: 1.0,
            metric: Metric::Time,
            node_mask: NodeMask::NoMask,
            effect_subsampling_rate: 1.0,
            critic_subsampling_rate: 1.0,
            early_stopping_solved_if_root_not_proven: false,
            virtual_loss: 1.0,
        }
    }
}

// Tag strings used by the state snapshot. Parsers are the inverse of the
// emitters; an unknown tag is a decode error, never a default.

pub(crate) fn policy_type_str(p: PolicyType) -> &'static str {
    match p {
        PolicyType::AlphaZero => "alpha_zero",
        PolicyType::Rpo => "rpo",
        PolicyType::Other => "other",
    }
}

pub(crate) fn parse_policy_type(s: &str) -> Option<PolicyType> {
    match s {
        "alpha_zero" => Some(PolicyType::AlphaZero),
        "rpo" => Some(PolicyType::Rpo),
        "other" => Some(PolicyType::Other),
        _ => None,
    }
}

pub(crate) fn q_value_solved_str(q: QValueSolved) -> &'static str {
    match q {
        QValueSolved::One => "one",
        QValueSolved::OneOverCounts => "one_over_counts",
        QValueSolved::CountOverCounts => "count_over_counts",
        QValueSolved::None => "none",
    }
}

pub(crate) fn parse_q_value_solved(s: &str) -> Option<QValueSolved> {
    match s {
        "one" => Some(QValueSolved::One),
        "one_over_counts" => Some(QValueSolved::OneOverCounts),
        "count_over_counts" => Some(QValueSolved::CountOverCounts),
        "none" => Some(QValueSolved::None),
        _ => None,
    }
}

pub(crate) fn metric_str(m: Metric) -> &'static str {
    match m {
        Metric::Time => "time",
        Metric::Depth => "depth",
        Metric::Size => "size",
    }
}

pub(crate) fn parse_metric(s: &str) -> Option<Metric> {
    match s {
        "time" => Some(Metric::Time),
        "depth" => Some(Metric::Depth),
        "size" => Some(Metric::Size),
        _ => None,
    }
}

pub(crate) fn node_mask_str(m: NodeMask) -> &'static str {
    match m {
        NodeMask::NoMask => "no_mask",
        NodeMask::Solving => "solving",
        NodeMask::Proof => "proof",
        NodeMask::MinimalProof => "minimal_proof",
        NodeMask::MinimalProofSolving => "minimal_proof_solving",
    }
}

pub(crate) fn parse_node_mask(s: &str) -> Option<NodeMask> {
    match s {
        "no_mask" => Some(NodeMask::NoMask),
        "solving" => Some(NodeMask::Solving),
        "proof" => Some(NodeMask::Proof),
        "minimal_proof" => Some(NodeMask::MinimalProof),
        "minimal_proof_solving" => Some(NodeMask::MinimalProofSolving),
        _ => None,
    }
}
