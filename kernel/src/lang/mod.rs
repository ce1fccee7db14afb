//! The goal language: theorems, tactics, hypotheses, contexts.

pub mod context;
pub mod hypothesis;
pub mod tactic;
pub mod theorem;

pub use context::Context;
pub use hypothesis::Hypothesis;
pub use tactic::Tactic;
pub use theorem::Theorem;
