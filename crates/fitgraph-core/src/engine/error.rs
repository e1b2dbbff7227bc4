use thiserror::Error;

use crate::core::ids::NodeId;
use crate::core::operation::Arity;
use crate::core::value::OperationError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("Value of '{node}' has not been set")]
    UnsetValue { node: String },

    #[error("Operator '{node}' has {bound} of {required} required input(s)")]
    MissingArgument {
        node: String,
        bound: usize,
        required: usize,
    },

    #[error("Operator '{node}' already has all {nin} of its inputs")]
    ArityExceeded { node: String, nin: Arity },

    #[error("Adding '{input}' as an input of '{node}' would create a cycle")]
    Cycle { node: String, input: String },

    #[error("Node {0:?} does not belong to this graph")]
    UnknownNode(NodeId),

    #[error("'{node}' is not an operator")]
    NotAnOperator { node: String },

    #[error("'{node}' is not an argument")]
    NotAnArgument { node: String },

    #[error("Evaluation of '{node}' failed: {source}")]
    Operation {
        node: String,
        #[source]
        source: OperationError,
    },
}
