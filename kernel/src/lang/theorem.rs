//! Theorems: the goals of the proof search.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::lang::context::Context;
use crate::lang::hypothesis::Hypothesis;
use crate::lang::tactic::Tactic;

/// A proof goal.
///
/// The identity key is `unique_string`: the node store interns theorems
/// by it, and equality and hashing ignore every other field. The other
/// fields are payload the environment and the model consume.
///
/// `metadata` is opaque side-channel state owned by the caller. It never
/// participates in identity, is stripped from JSON snapshots, and lives
/// only as long as the node store holds a reference to the goal. When a
/// goal is re-observed (the same `unique_string` arriving through a new
/// expansion), the store refreshes metadata to the last-seen map.
#[derive(Debug, Clone)]
pub struct Theorem {
    pub conclusion: String,
    pub unique_string: String,
    pub hypotheses: Vec<Hypothesis>,
    pub context: Context,
    /// Tactics already applied on the path that produced this goal.
    pub past_tactics: Vec<Tactic>,
    pub metadata: BTreeMap<String, String>,
}

impl Theorem {
    #[must_use]
    pub fn new(
        conclusion: impl Into<String>,
        unique_string: impl Into<String>,
        hypotheses: Vec<Hypothesis>,
        context: Context,
        past_tactics: Vec<Tactic>,
    ) -> Self {
        Self {
            conclusion: conclusion.into(),
            unique_string: unique_string.into(),
            hypotheses,
            context,
            past_tactics,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach caller-owned metadata, builder style.
    #[must_use]
    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

impl PartialEq for Theorem {
    fn eq(&self, other: &Self) -> bool {
        self.unique_string == other.unique_string
    }
}

impl Eq for Theorem {}

impl Hash for Theorem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.unique_string.hash(state);
    }
}
