//! Observed environment transitions.

use crate::canon::canonical_json_bytes;
use crate::hash::{canonical_hash, ContentHash, DOMAIN_EFFECT};
use crate::lang::{Tactic, Theorem};

/// One observed transition: running `tactic` on `goal` produced
/// `children` (all of which must be proved for the step to close).
///
/// Effects are reported by the environment alongside an expansion and
/// harvested as training data; the search graph itself never consumes
/// them.
#[derive(Debug, Clone)]
pub struct EnvEffect {
    pub goal: Theorem,
    pub tactic: Tactic,
    pub children: Vec<Theorem>,
}

impl EnvEffect {
    #[must_use]
    pub fn new(goal: Theorem, tactic: Tactic, children: Vec<Theorem>) -> Self {
        Self {
            goal,
            tactic,
            children,
        }
    }

    /// Content hash identifying this effect for deduplication.
    ///
    /// Keyed on the goal and tactic unique strings plus the ordered
    /// child unique strings; child order is part of the key because
    /// children are a multiset with insertion order.
    #[must_use]
    pub fn dedup_key(&self) -> ContentHash {
        let key = serde_json::json!({
            "goal": self.goal.unique_string,
            "tactic": self.tactic.unique_string,
            "children": self
                .children
                .iter()
                .map(|c| c.unique_string.as_str())
                .collect::<Vec<_>>(),
        });
        // All-string payload, so canonicalization cannot fail.
        let bytes = canonical_json_bytes(&key).unwrap_or_default();
        canonical_hash(DOMAIN_EFFECT, &bytes)
    }
}
