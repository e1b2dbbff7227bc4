//! # fitgraph
//!
//! A lazily evaluated expression graph for structure refinement. A fit equation
//! is assembled from leaf arguments (refinable parameters, observed profiles)
//! and operators (arithmetic, profile convolution), and evaluated on demand
//! with per-node caching that is invalidated whenever an upstream argument
//! changes. An optimizer driving the fit sets arguments and reads the root
//! node once per iteration.
//!
//! ## Layout
//!
//! - **[`core`]**: stateless pieces, namely node identifiers, values, literal
//!   node types and the numeric operations, including the renormalized
//!   convolution used for instrument broadening.
//!
//! - **[`engine`]**: the [`engine::graph::Graph`] arena with wiring, cycle
//!   checks, evaluation, invalidation and configuration.
//!
//! ```ignore
//! use fitgraph::core::{operation::Operation, value::Value};
//! use fitgraph::engine::graph::Graph;
//!
//! let mut graph = Graph::new();
//! let a = graph.add_argument(Some("a"), Some(Value::from(4.0)));
//! let b = graph.add_argument(Some("b"), Some(Value::from(2.0)));
//! let sum = graph.add_operator(None, Operation::add());
//! graph.add_literal(sum, a)?;
//! graph.add_literal(sum, b)?;
//! assert_eq!(graph.value(sum)?, &Value::from(6.0));
//!
//! graph.set_value(b, 10.0)?;
//! assert_eq!(graph.value(sum)?, &Value::from(14.0));
//! ```

pub mod core;
pub mod engine;
