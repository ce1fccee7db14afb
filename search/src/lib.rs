//! HyperTree Search: best-first AND/OR proof search over a hypergraph.
//!
//! This crate is the algorithmic core of the workspace. It owns the proof
//! hypergraph, the PUCT-style selection and backup machinery, the batched
//! search driver, and the training-sample harvester. It depends only on
//! `hypertree_kernel` — it does NOT depend on `hypertree_harness`.
//!
//! # Crate dependency graph
//!
//! ```text
//! hypertree_kernel  ←  hypertree_search  ←  hypertree_harness
//! (goals, records)     (hypergraph, driver)  (oracle contract, runner)
//! ```
//!
//! # Key types
//!
//! - [`graph::HyperGraph`] — interned node store with hyperedges
//! - [`params::SearchParams`] — every knob of the search, validated
//! - [`search::Htps`] — the batched driver (select → expand → backup)
//! - [`proof::ProofTree`] — minimal proof extracted from a solved root
//! - [`samples::SearchResult`] — harvested critic/tactic/effect samples
//!
//! The driver is single-threaded cooperative: all state transitions occur
//! inside [`search::Htps::theorems_to_expand`] and
//! [`search::Htps::expand_and_backup`]; the caller runs environment and
//! model work between those calls. Virtual loss is the only mechanism
//! that makes one batch's selections diverge — no threads, no scheduler.

#![forbid(unsafe_code)]

pub mod error;
pub mod graph;
pub mod params;
pub mod proof;
pub mod samples;
pub mod search;
pub mod state;
pub mod value;
