use super::config::GraphConfig;
use super::error::GraphError;
use crate::core::ids::NodeId;
use crate::core::literal::{Literal, LiteralKind};
use crate::core::operation::{Arity, Operation};
use crate::core::value::Value;
use slotmap::{SecondaryMap, SlotMap};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Arena owning every literal of an expression graph.
///
/// Operators refer to their inputs by [`NodeId`]; the graph owns the nodes and
/// keeps a back-reference list per node recording which operators consume it.
/// Invalidation follows those recorded dependents instead of rescanning the
/// whole graph. The same node may feed many operators, so the structure is a
/// DAG; attaching an input that would close a cycle is refused.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Primary storage for all literals.
    pub(crate) literals: SlotMap<NodeId, Literal>,
    /// Operators consuming each node, without duplicates.
    pub(crate) dependents: SecondaryMap<NodeId, Vec<NodeId>>,
    config: GraphConfig,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Adds a leaf node, optionally named and optionally holding an initial value.
    pub fn add_argument(&mut self, name: Option<&str>, value: Option<Value>) -> NodeId {
        let id = self.literals.insert(Literal::argument(name, value));
        self.dependents.insert(id, Vec::new());
        debug!("Added argument {:?} ({})", id, self.label(id));
        id
    }

    /// Adds an operator node with no inputs bound yet.
    pub fn add_operator(&mut self, name: Option<&str>, operation: Operation) -> NodeId {
        let symbol = operation.symbol().to_string();
        let id = self.literals.insert(Literal::operator(name, operation));
        self.dependents.insert(id, Vec::new());
        debug!("Added operator {:?} ({}) with symbol '{}'", id, self.label(id), symbol);
        id
    }

    /// Adds a two-input convolution operator using the graph's zero-sum policy.
    pub fn add_convolution_operator(&mut self, name: Option<&str>) -> NodeId {
        let operation = Operation::convolution(self.config.zero_sum_policy);
        self.add_operator(name, operation)
    }

    pub fn node(&self, id: NodeId) -> Option<&Literal> {
        self.literals.get(id)
    }

    pub fn nodes_iter(&self) -> impl Iterator<Item = (NodeId, &Literal)> {
        self.literals.iter()
    }

    /// Iterates over all leaf nodes.
    pub fn arguments(&self) -> impl Iterator<Item = (NodeId, &Literal)> {
        self.literals.iter().filter(|(_, lit)| lit.is_argument())
    }

    /// Iterates over leaf nodes not flagged as constant, i.e. the ones a refinement may vary.
    pub fn free_arguments(&self) -> impl Iterator<Item = (NodeId, &Literal)> {
        self.arguments().filter(|(_, lit)| !lit.is_constant())
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.literals
            .iter()
            .find(|(_, lit)| lit.name() == Some(name))
            .map(|(id, _)| id)
    }

    /// Operators that take `id` as a direct input.
    pub fn dependents(&self, id: NodeId) -> &[NodeId] {
        self.dependents
            .get(id)
            .map_or([].as_slice(), |v| v.as_slice())
    }

    /// Bound inputs of an operator, in evaluation order.
    pub fn args(&self, id: NodeId) -> Result<&[NodeId], GraphError> {
        self.literal(id)?
            .as_operator()
            .map(|op| op.args())
            .ok_or_else(|| GraphError::NotAnOperator {
                node: self.label(id),
            })
    }

    pub fn cached_value(&self, id: NodeId) -> Option<&Value> {
        self.literals.get(id).and_then(|lit| lit.cached_value())
    }

    pub fn is_constant(&self, id: NodeId) -> Result<bool, GraphError> {
        Ok(self.literal(id)?.is_constant())
    }

    pub fn set_constant(&mut self, id: NodeId, constant: bool) -> Result<(), GraphError> {
        self.literal_mut(id)?.set_constant(constant);
        Ok(())
    }

    /// Binds `input` as the next input of operator `op`.
    ///
    /// The call is rejected without changing anything when `input` is `op`
    /// itself, when `op` is already reachable from `input`, or when `op` has
    /// no free input slot. On success the cache of `op` and of every node
    /// downstream of it is cleared.
    ///
    /// The cycle check walks everything `input` depends on and the invalidation
    /// walks everything downstream of `op`. Each call is linear in the size of
    /// those sets, so wiring an `n`-level chain one node at a time costs
    /// `O(n²)` overall.
    pub fn add_literal(&mut self, op: NodeId, input: NodeId) -> Result<(), GraphError> {
        let operator = self
            .literal(op)?
            .as_operator()
            .ok_or_else(|| GraphError::NotAnOperator {
                node: self.label(op),
            })?;
        let nin = operator.nin();
        let bound = operator.args().len();
        self.literal(input)?;

        if input == op || self.depends_on(input, op) {
            return Err(GraphError::Cycle {
                node: self.label(op),
                input: self.label(input),
            });
        }
        if nin.is_full(bound) {
            return Err(GraphError::ArityExceeded {
                node: self.label(op),
                nin,
            });
        }

        if let Some(operator) = self.literals.get_mut(op).and_then(|lit| lit.as_operator_mut()) {
            operator.args.push(input);
        }
        if let Some(dependents) = self.dependents.get_mut(input) {
            if !dependents.contains(&op) {
                dependents.push(op);
            }
        }

        debug!(
            "Bound {} as input {} of {}",
            self.label(input),
            bound + 1,
            self.label(op)
        );

        self.invalidate(op)?;
        Ok(())
    }

    /// Returns `true` if `target` is reachable from `from` by following input edges.
    ///
    /// Runs in time linear in the number of nodes `from` depends on.
    pub fn depends_on(&self, from: NodeId, target: NodeId) -> bool {
        let mut stack = vec![from];
        let mut visited = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(lit) = self.literals.get(current) {
                stack.extend(lit.inputs().iter().copied());
            }
        }
        false
    }

    /// Formats the expression rooted at `id` in infix notation.
    pub fn display(&self, id: NodeId) -> Result<ExpressionDisplay<'_>, GraphError> {
        self.literal(id)?;
        Ok(ExpressionDisplay { graph: self, root: id })
    }

    pub(crate) fn literal(&self, id: NodeId) -> Result<&Literal, GraphError> {
        self.literals.get(id).ok_or(GraphError::UnknownNode(id))
    }

    pub(crate) fn literal_mut(&mut self, id: NodeId) -> Result<&mut Literal, GraphError> {
        self.literals.get_mut(id).ok_or(GraphError::UnknownNode(id))
    }

    /// Human-readable identification of a node for logs and errors.
    pub(crate) fn label(&self, id: NodeId) -> String {
        match self.literals.get(id).and_then(|lit| lit.name()) {
            Some(name) => name.to_string(),
            None => format!("{:?}", id),
        }
    }
}

/// Infix rendering of an expression, returned by [`Graph::display`].
pub struct ExpressionDisplay<'a> {
    graph: &'a Graph,
    root: NodeId,
}

impl ExpressionDisplay<'_> {
    fn write_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId) -> fmt::Result {
        let Some(lit) = self.graph.literals.get(id) else {
            return write!(f, "?");
        };
        match &lit.kind {
            LiteralKind::Argument(arg) => match (lit.name(), arg.value()) {
                (Some(name), _) => write!(f, "{}", name),
                (None, Some(Value::Scalar(v))) => write!(f, "{}", v),
                (None, Some(Value::Array(a))) => write!(f, "[{} samples]", a.len()),
                (None, None) => write!(f, "?"),
            },
            LiteralKind::Operator(op) => {
                let infix = op.nin() == Arity::Fixed(2)
                    && !op.symbol().chars().any(char::is_alphanumeric);
                if infix && op.args().len() == 2 {
                    write!(f, "(")?;
                    self.write_node(f, op.args()[0])?;
                    write!(f, " {} ", op.symbol())?;
                    self.write_node(f, op.args()[1])?;
                    write!(f, ")")
                } else {
                    write!(f, "{}(", op.symbol())?;
                    for (i, &arg) in op.args().iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        self.write_node(f, arg)?;
                    }
                    write!(f, ")")
                }
            }
        }
    }
}

impl fmt::Display for ExpressionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_node(f, self.root)
    }
}
