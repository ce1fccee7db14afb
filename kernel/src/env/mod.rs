//! Environment transition records consumed by the search core.

pub mod effect;
pub mod expansion;

pub use effect::EnvEffect;
pub use expansion::{critic_probability, EnvExpansion, ExpansionOutcome, TacticProposals};
