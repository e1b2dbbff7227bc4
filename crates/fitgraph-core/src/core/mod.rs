//! # Core Module
//!
//! Building blocks of the expression graph: node identities, numeric values,
//! literal node types and the operations operators apply.
//!
//! ## Overview
//!
//! A fit equation is represented as a directed acyclic graph of [`literal::Literal`]
//! nodes. Leaves are arguments holding numbers or sampled profiles; internal
//! nodes are operators wrapping an [`operation::Operation`]. This module holds
//! the stateless pieces; wiring, caching and evaluation live in the
//! [`crate::engine`] layer.
//!
//! - [`ids`] - Stable node identifiers
//! - [`value`] - Scalar and array values with elementwise broadcasting
//! - [`literal`] - Argument and operator node types
//! - [`operation`] - Numeric functions with symbol and arity metadata
//! - [`convolution`] - Renormalized discrete convolution used for profile broadening

pub mod convolution;
pub mod ids;
pub mod literal;
pub mod operation;
pub mod value;
