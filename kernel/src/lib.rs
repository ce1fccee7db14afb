//! HyperTree Kernel: the pure value layer of the HyperTree workspace.
//!
//! This crate defines the goal language (theorems, tactics, hypotheses,
//! contexts), the environment transition records consumed by the search
//! core, and the two deterministic primitives every other crate routes
//! through: canonical JSON bytes and domain-separated content hashing.
//!
//! # Module Dependency Direction
//!
//! `lang` ← `env`; `canon` and `hash` depend on nothing internal.
//!
//! The kernel holds no search state and performs no search logic. It is
//! the single owner of value identity: two theorems are the same goal
//! exactly when their `unique_string`s are equal, regardless of metadata.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod canon;
pub mod env;
pub mod error;
pub mod hash;
pub mod lang;
