//! State snapshots: serialize a search to JSON and restore it.
//!
//! The snapshot preserves params, the root goal, and every node with its
//! edges and accumulated statistics. Theorem metadata is intentionally
//! stripped — it is caller-owned side-channel state. In-flight virtual
//! loss is transient and not serialized; a restored search resumes
//! quiescent, ready for a fresh selection batch.
//!
//! Decoding is fail-closed: every structural violation maps to a typed
//! [`StateDecodeError`], and restored params re-run full validation.

use serde_json::{json, Value};

use hypertree_kernel::env::EnvEffect;
use hypertree_kernel::lang::{Context, Hypothesis, Tactic, Theorem};

use crate::error::SearchError;
use crate::graph::{ExpansionState, GraphNode, HyperGraph};
use crate::params::{
    self, parse_metric, parse_node_mask, parse_policy_type, parse_q_value_solved, SearchParams,
};
use crate::search::{parse_termination, termination_str, Htps};

/// Snapshot schema version.
const STATE_VERSION: u64 = 1;

/// Typed failure while decoding a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateDecodeError {
    /// The input is not JSON at all.
    BadJson { detail: String },
    /// Schema version mismatch.
    UnsupportedVersion { got: u64 },
    /// A required field is absent.
    MissingField { field: String },
    /// A field holds the wrong JSON type or an out-of-range number.
    BadField { field: String },
    /// An enum tag did not match any known variant.
    UnknownTag { field: String, got: String },
    /// An edge references a child with no node entry.
    UnknownChild { unique: String },
    /// Two node entries share one unique string.
    DuplicateNode { unique: String },
    /// The declared root has no node entry.
    RootMissing { unique: String },
}

impl std::fmt::Display for StateDecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadJson { detail } => write!(f, "not valid JSON: {detail}"),
            Self::UnsupportedVersion { got } => {
                write!(f, "unsupported snapshot version {got}")
            }
            Self::MissingField { field } => write!(f, "missing field `{field}`"),
            Self::BadField { field } => write!(f, "malformed field `{field}`"),
            Self::UnknownTag { field, got } => {
                write!(f, "unknown tag `{got}` in field `{field}`")
            }
            Self::UnknownChild { unique } => {
                write!(f, "edge references unknown goal `{unique}`")
            }
            Self::DuplicateNode { unique } => {
                write!(f, "duplicate node entry for goal `{unique}`")
            }
            Self::RootMissing { unique } => {
                write!(f, "declared root `{unique}` has no node entry")
            }
        }
    }
}

impl std::error::Error for StateDecodeError {}

impl Htps {
    /// Serialize the full search state to a JSON string.
    ///
    /// Object keys are emitted sorted, so equal states produce equal
    /// strings.
    #[must_use]
    pub fn get_json_str(&self) -> String {
        let nodes: Vec<Value> = self
            .graph()
            .iter()
            .map(|(_, node)| node_to_json(self.graph(), node))
            .collect();
        let root = &self.graph().node(self.graph().root()).theorem.unique_string;
        let effects: Vec<Value> = self.observed_effects.iter().map(effect_to_json).collect();
        json!({
            "version": STATE_VERSION,
            "params": params_to_json(self.params()),
            "root": root,
            "terminal": self.termination().map(termination_str),
            "counters": {
                "batches": self.batches,
                "expansions_applied": self.expansions_applied,
            },
            "nodes": nodes,
            "effects": effects,
        })
        .to_string()
    }

    /// Restore a search from [`Htps::get_json_str`] output.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::StateDecode`] on any structural violation
    /// and [`SearchError::InvalidParams`] when the restored params fail
    /// validation.
    pub fn from_json_str(s: &str) -> Result<Self, SearchError> {
        let value: Value =
            serde_json::from_str(s).map_err(|e| StateDecodeError::BadJson {
                detail: e.to_string(),
            })?;

        let version = field_u64(&value, "version")?;
        if version != STATE_VERSION {
            return Err(StateDecodeError::UnsupportedVersion { got: version }.into());
        }

        let params = parse_params(field(&value, "params")?)?;
        params.validate()?;

        let root_unique = field_str(&value, "root")?.to_string();
        let node_values = field_array(&value, "nodes")?;

        // Pass A: intern every theorem, root first so it lands at the
        // root slot.
        let mut root_theorem = None;
        let mut seen = std::collections::HashSet::new();
        let mut parsed: Vec<(Theorem, &Value)> = Vec::with_capacity(node_values.len());
        for entry in node_values {
            let theorem = parse_theorem(field(entry, "theorem")?, field_str(entry, "unique_string")?)?;
            if !seen.insert(theorem.unique_string.clone()) {
                return Err(StateDecodeError::DuplicateNode {
                    unique: theorem.unique_string,
                }
                .into());
            }
            if theorem.unique_string == root_unique {
                root_theorem = Some(theorem.clone());
            }
            parsed.push((theorem, entry));
        }
        let Some(root_theorem) = root_theorem else {
            return Err(StateDecodeError::RootMissing {
                unique: root_unique,
            }
            .into());
        };

        let mut graph = HyperGraph::new(root_theorem);
        for (theorem, _) in &parsed {
            graph.get_or_create(theorem.clone());
        }

        // Pass B: scalar state and status flags.
        for (theorem, entry) in &parsed {
            let id = graph
                .id_of(&theorem.unique_string)
                .ok_or_else(|| StateDecodeError::UnknownChild {
                    unique: theorem.unique_string.clone(),
                })?;
            let solved = field_bool(entry, "solved")?;
            let killed = field_bool(entry, "killed")?;
            graph.restore_status(id, solved, killed);
            let node = graph.node_mut(id);
            node.visit_count = field_u64(entry, "visit_count")?;
            node.prior_mass = field_f64(entry, "prior_mass")?;
            node.log_critic = match entry.get("log_critic") {
                None | Some(Value::Null) => None,
                Some(v) => Some(number_f64(v, "log_critic")?),
            };
            node.expansion = parse_expansion_state(field(entry, "expansion")?)?;
        }

        // Pass C: edges, with dead marks recomputed from restored kills.
        for (theorem, entry) in &parsed {
            let id = graph
                .id_of(&theorem.unique_string)
                .ok_or_else(|| StateDecodeError::UnknownChild {
                    unique: theorem.unique_string.clone(),
                })?;
            for edge in field_array(entry, "edges")? {
                let tactic = parse_tactic(field(edge, "tactic")?)?;
                let mut children = Vec::new();
                for child in field_array(edge, "children")? {
                    let unique = string_of(child, "children")?;
                    let child_id =
                        graph
                            .id_of(unique)
                            .ok_or_else(|| StateDecodeError::UnknownChild {
                                unique: unique.to_string(),
                            })?;
                    children.push(child_id);
                }
                graph.restore_edge(
                    id,
                    tactic,
                    field_f64(edge, "prior")?,
                    children,
                    field_u64(edge, "n")?,
                    field_f64(edge, "w")?,
                    field_bool(edge, "cycle_masked")?,
                );
            }
        }

        let terminal = match value.get("terminal") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(parse_termination(s).ok_or_else(|| {
                StateDecodeError::UnknownTag {
                    field: "terminal".to_string(),
                    got: s.clone(),
                }
            })?),
            Some(_) => {
                return Err(StateDecodeError::BadField {
                    field: "terminal".to_string(),
                }
                .into())
            }
        };

        let mut observed_effects = Vec::new();
        for effect in field_array(&value, "effects")? {
            observed_effects.push(parse_effect(effect)?);
        }

        let counters = field(&value, "counters")?;
        let batches = field_u64(counters, "batches")?;
        let expansions_applied = field_u64(counters, "expansions_applied")?;

        Ok(Htps::from_parts(
            graph,
            params,
            terminal,
            observed_effects,
            batches,
            expansions_applied,
        ))
    }
}

// ---------------------------------------------------------------------------
// Emission
// ---------------------------------------------------------------------------

fn params_to_json(p: &SearchParams) -> Value {
    json!({
        "exploration": p.exploration,
        "policy_type": params::policy_type_str(p.policy_type),
        "num_expansions": p.num_expansions,
        "succ_expansions": p.succ_expansions,
        "early_stopping": p.early_stopping,
        "no_critic": p.no_critic,
        "backup_once": p.backup_once,
        "backup_one_for_solved": p.backup_one_for_solved,
        "depth_penalty": p.depth_penalty,
        "count_threshold": p.count_threshold,
        "tactic_p_threshold": p.tactic_p_threshold,
        "tactic_sample_q_conditioning": p.tactic_sample_q_conditioning,
        "only_learn_best_tactics": p.only_learn_best_tactics,
        "tactic_init_value": p.tactic_init_value,
        "q_value_solved": params::q_value_solved_str(p.q_value_solved),
        "policy_temperature": p.policy_temperature,
        "metric": params::metric_str(p.metric),
        "node_mask": params::node_mask_str(p.node_mask),
        "effect_subsampling_rate": p.effect_subsampling_rate,
        "critic_subsampling_rate": p.critic_subsampling_rate,
        "early_stopping_solved_if_root_not_proven": p.early_stopping_solved_if_root_not_proven,
        "virtual_loss": p.virtual_loss,
    })
}

fn tactic_to_json(t: &Tactic) -> Value {
    json!({
        "unique_string": t.unique_string,
        "is_valid": t.is_valid,
        "duration": t.duration,
    })
}

/// Theorem payload minus metadata (caller-owned, never serialized).
fn theorem_to_json(t: &Theorem) -> Value {
    json!({
        "conclusion": t.conclusion,
        "hypotheses": t.hypotheses.iter().map(|h| json!({
            "identifier": h.identifier,
            "value": h.value,
        })).collect::<Vec<_>>(),
        "context": t.context.namespaces,
        "past_tactics": t.past_tactics.iter().map(tactic_to_json).collect::<Vec<_>>(),
    })
}

fn goal_to_json(t: &Theorem) -> Value {
    json!({
        "unique_string": t.unique_string,
        "theorem": theorem_to_json(t),
    })
}

/// Effects embed full goal payloads: a losing duplicate tactic's
/// children may never have been interned as nodes, so unique-string
/// references would not always resolve.
fn effect_to_json(e: &EnvEffect) -> Value {
    json!({
        "goal": goal_to_json(&e.goal),
        "tactic": tactic_to_json(&e.tactic),
        "children": e.children.iter().map(goal_to_json).collect::<Vec<_>>(),
    })
}

fn node_to_json(graph: &HyperGraph, node: &GraphNode) -> Value {
    let expansion = match &node.expansion {
        ExpansionState::Unexpanded => json!("unexpanded"),
        ExpansionState::Expanded => json!("expanded"),
        ExpansionState::Errored(e) => json!({ "error": e }),
    };
    let edges: Vec<Value> = node
        .edges
        .iter()
        .map(|e| {
            let children: Vec<&str> = e
                .children
                .iter()
                .map(|&c| graph.node(c).theorem.unique_string.as_str())
                .collect();
            json!({
                "tactic": tactic_to_json(&e.tactic),
                "prior": e.prior,
                "n": e.n,
                "w": e.w,
                "children": children,
                "cycle_masked": e.cycle_masked,
            })
        })
        .collect();
    json!({
        "unique_string": node.theorem.unique_string,
        "theorem": theorem_to_json(&node.theorem),
        "expansion": expansion,
        "log_critic": node.log_critic,
        "visit_count": node.visit_count,
        "solved": node.solved,
        "killed": node.killed,
        "prior_mass": node.prior_mass,
        "edges": edges,
    })
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn field<'a>(value: &'a Value, name: &str) -> Result<&'a Value, StateDecodeError> {
    value.get(name).ok_or_else(|| StateDecodeError::MissingField {
        field: name.to_string(),
    })
}

fn field_str<'a>(value: &'a Value, name: &str) -> Result<&'a str, StateDecodeError> {
    string_of(field(value, name)?, name)
}

fn string_of<'a>(value: &'a Value, name: &str) -> Result<&'a str, StateDecodeError> {
    value.as_str().ok_or_else(|| StateDecodeError::BadField {
        field: name.to_string(),
    })
}

fn field_u64(value: &Value, name: &str) -> Result<u64, StateDecodeError> {
    field(value, name)?
        .as_u64()
        .ok_or_else(|| StateDecodeError::BadField {
            field: name.to_string(),
        })
}

fn field_bool(value: &Value, name: &str) -> Result<bool, StateDecodeError> {
    field(value, name)?
        .as_bool()
        .ok_or_else(|| StateDecodeError::BadField {
            field: name.to_string(),
        })
}

fn field_f64(value: &Value, name: &str) -> Result<f64, StateDecodeError> {
    number_f64(field(value, name)?, name)
}

fn number_f64(value: &Value, name: &str) -> Result<f64, StateDecodeError> {
    value.as_f64().ok_or_else(|| StateDecodeError::BadField {
        field: name.to_string(),
    })
}

fn field_array<'a>(value: &'a Value, name: &str) -> Result<&'a Vec<Value>, StateDecodeError> {
    field(value, name)?
        .as_array()
        .ok_or_else(|| StateDecodeError::BadField {
            field: name.to_string(),
        })
}

fn field_usize(value: &Value, name: &str) -> Result<usize, StateDecodeError> {
    usize::try_from(field_u64(value, name)?).map_err(|_| StateDecodeError::BadField {
        field: name.to_string(),
    })
}

fn tag<'a, T>(
    value: &'a Value,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, StateDecodeError> {
    let s = field_str(value, name)?;
    parse(s).ok_or_else(|| StateDecodeError::UnknownTag {
        field: name.to_string(),
        got: s.to_string(),
    })
}

fn parse_params(value: &Value) -> Result<SearchParams, StateDecodeError> {
    Ok(SearchParams {
        exploration: field_f64(value, "exploration")?,
        policy_type: tag(value, "policy_type", parse_policy_type)?,
        num_expansions: field_usize(value, "num_expansions")?,
        succ_expansions: field_usize(value, "succ_expansions")?,
        early_stopping: field_bool(value, "early_stopping")?,
        no_critic: field_bool(value, "no_critic")?,
        backup_once: field_bool(value, "backup_once")?,
        backup_one_for_solved: field_bool(value, "backup_one_for_solved")?,
        depth_penalty: field_f64(value, "depth_penalty")?,
        count_threshold: u32::try_from(field_u64(value, "count_threshold")?).map_err(|_| {
            StateDecodeError::BadField {
                field: "count_threshold".to_string(),
            }
        })?,
        tactic_p_threshold: field_f64(value, "tactic_p_threshold")?,
        tactic_sample_q_conditioning: field_bool(value, "tactic_sample_q_conditioning")?,
        only_learn_best_tactics: field_bool(value, "only_learn_best_tactics")?,
        tactic_init_value: field_f64(value, "tactic_init_value")?,
        q_value_solved: tag(value, "q_value_solved", parse_q_value_solved)?,
        policy_temperature: field_f64(value, "policy_temperature")?,
        metric: tag(value, "metric", parse_metric)?,
        node_mask: tag(value, "node_mask", parse_node_mask)?,
        effect_subsampling_rate: field_f64(value, "effect_subsampling_rate")?,
        critic_subsampling_rate: field_f64(value, "critic_subsampling_rate")?,
        early_stopping_solved_if_root_not_proven: field_bool(
            value,
            "early_stopping_solved_if_root_not_proven",
        )?,
        virtual_loss: field_f64(value, "virtual_loss")?,
    })
}

fn parse_tactic(value: &Value) -> Result<Tactic, StateDecodeError> {
    Ok(Tactic::new(
        field_str(value, "unique_string")?,
        field_bool(value, "is_valid")?,
        field_u64(value, "duration")?,
    ))
}

fn parse_theorem(value: &Value, unique_string: &str) -> Result<Theorem, StateDecodeError> {
    let mut hypotheses = Vec::new();
    for h in field_array(value, "hypotheses")? {
        hypotheses.push(Hypothesis::new(
            field_str(h, "identifier")?,
            field_str(h, "value")?,
        ));
    }
    let mut namespaces = Vec::new();
    for ns in field_array(value, "context")? {
        namespaces.push(string_of(ns, "context")?.to_string());
    }
    let mut past_tactics = Vec::new();
    for t in field_array(value, "past_tactics")? {
        past_tactics.push(parse_tactic(t)?);
    }
    Ok(Theorem::new(
        field_str(value, "conclusion")?,
        unique_string,
        hypotheses,
        Context::new(namespaces),
        past_tactics,
    ))
}

fn parse_goal(value: &Value) -> Result<Theorem, StateDecodeError> {
    parse_theorem(field(value, "theorem")?, field_str(value, "unique_string")?)
}

fn parse_effect(value: &Value) -> Result<EnvEffect, StateDecodeError> {
    let goal = parse_goal(field(value, "goal")?)?;
    let tactic = parse_tactic(field(value, "tactic")?)?;
    let mut children = Vec::new();
    for child in field_array(value, "children")? {
        children.push(parse_goal(child)?);
    }
    Ok(EnvEffect::new(goal, tactic, children))
}

fn parse_expansion_state(value: &Value) -> Result<ExpansionState, StateDecodeError> {
    match value {
        Value::String(s) if s == "unexpanded" => Ok(ExpansionState::Unexpanded),
        Value::String(s) if s == "expanded" => Ok(ExpansionState::Expanded),
        Value::Object(_) => Ok(ExpansionState::Errored(
            field_str(value, "error")?.to_string(),
        )),
        Value::String(s) => Err(StateDecodeError::UnknownTag {
            field: "expansion".to_string(),
            got: s.clone(),
        }),
        _ => Err(StateDecodeError::BadField {
            field: "expansion".to_string(),
        }),
    }
}
