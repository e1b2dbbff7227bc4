use super::ids::NodeId;
use super::operation::{Arity, Operation};
use super::value::Value;

/// A leaf holding a directly assigned value.
#[derive(Debug, Clone, Default)]
pub struct Argument {
    pub(crate) value: Option<Value>,
}

impl Argument {
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }
}

/// An internal node applying an [`Operation`] to its ordered inputs.
#[derive(Debug, Clone)]
pub struct Operator {
    pub(crate) operation: Operation,
    pub(crate) args: Vec<NodeId>,
}

impl Operator {
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn symbol(&self) -> &str {
        self.operation.symbol()
    }

    pub fn nin(&self) -> Arity {
        self.operation.arity()
    }

    pub fn nout(&self) -> usize {
        self.operation.nout()
    }

    /// Bound inputs, in the order they are passed to the operation.
    pub fn args(&self) -> &[NodeId] {
        &self.args
    }

    pub fn is_fully_bound(&self) -> bool {
        self.nin().is_satisfied(self.args.len())
    }
}

#[derive(Debug, Clone)]
pub enum LiteralKind {
    Argument(Argument),
    Operator(Operator),
}

/// A node of the expression graph, leaf or internal.
///
/// Every literal carries an optional name, an advisory constant flag and a
/// memoized value. For operators the memo is the cached result of the last
/// evaluation; `None` means it must be recomputed on the next read.
#[derive(Debug, Clone)]
pub struct Literal {
    name: Option<String>,
    constant: bool,
    pub(crate) cache: Option<Value>,
    pub(crate) kind: LiteralKind,
}

impl Literal {
    pub(crate) fn argument(name: Option<&str>, value: Option<Value>) -> Self {
        Self {
            name: name.map(str::to_string),
            constant: false,
            cache: None,
            kind: LiteralKind::Argument(Argument { value }),
        }
    }

    pub(crate) fn operator(name: Option<&str>, operation: Operation) -> Self {
        Self {
            name: name.map(str::to_string),
            constant: false,
            cache: None,
            kind: LiteralKind::Operator(Operator {
                operation,
                args: Vec::new(),
            }),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether the node is flagged as constant.
    ///
    /// The flag is metadata for consumers (e.g. "do not refine this"); it does
    /// not prevent the value from being set.
    pub fn is_constant(&self) -> bool {
        self.constant
    }

    pub(crate) fn set_constant(&mut self, constant: bool) {
        self.constant = constant;
    }

    pub fn kind(&self) -> &LiteralKind {
        &self.kind
    }

    pub fn is_argument(&self) -> bool {
        matches!(self.kind, LiteralKind::Argument(_))
    }

    pub fn as_argument(&self) -> Option<&Argument> {
        match &self.kind {
            LiteralKind::Argument(arg) => Some(arg),
            LiteralKind::Operator(_) => None,
        }
    }

    pub fn as_operator(&self) -> Option<&Operator> {
        match &self.kind {
            LiteralKind::Argument(_) => None,
            LiteralKind::Operator(op) => Some(op),
        }
    }

    pub(crate) fn as_operator_mut(&mut self) -> Option<&mut Operator> {
        match &mut self.kind {
            LiteralKind::Argument(_) => None,
            LiteralKind::Operator(op) => Some(op),
        }
    }

    /// The value a read would return without recomputation, if any.
    pub fn cached_value(&self) -> Option<&Value> {
        match &self.kind {
            LiteralKind::Argument(arg) => arg.value.as_ref(),
            LiteralKind::Operator(_) => self.cache.as_ref(),
        }
    }

    /// Inputs of this node; empty for arguments.
    pub fn inputs(&self) -> &[NodeId] {
        match &self.kind {
            LiteralKind::Argument(_) => &[],
            LiteralKind::Operator(op) => op.args.as_slice(),
        }
    }
}
