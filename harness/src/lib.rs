//! HyperTree Harness: orchestration around the search core.
//!
//! The harness drives an [`hypertree_search::search::Htps`] instance
//! against a [`contract::ProvingEnv`] oracle through the batch loop
//! (`theorems_to_expand` → oracle → `expand_and_backup`) and packages
//! the outcome as an artifact directory.
//!
//! The harness does NOT implement search logic — it delegates to the
//! search crate. Environments provide domain data only; the harness
//! owns orchestration.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod artifact;
pub mod contract;
pub mod envs;
pub mod runner;
