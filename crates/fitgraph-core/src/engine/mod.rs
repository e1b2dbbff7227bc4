//! # Engine Module
//!
//! The stateful layer of the library: the [`graph::Graph`] arena that owns every
//! literal, wires operators to their inputs, and evaluates expressions lazily.
//!
//! ## Overview
//!
//! Callers create arguments and operators, bind inputs with
//! [`graph::Graph::add_literal`], and read results with [`graph::Graph::value`].
//! Each operator memoizes its last result. Setting an argument clears the
//! caches of everything downstream of it by walking the dependents recorded
//! when inputs were bound, so repeated reads between changes cost nothing.
//!
//! - **Graph** ([`graph`]) - Node storage, wiring and cycle checks
//! - **Evaluation** ([`evaluation`]) - Pull-based evaluation and cache invalidation
//! - **Configuration** ([`config`]) - Evaluation settings and their TOML loader
//! - **Error Handling** ([`error`]) - Errors raised while building or evaluating a graph

pub mod config;
pub mod error;
pub mod evaluation;
pub mod graph;
