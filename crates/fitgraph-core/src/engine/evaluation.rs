use super::error::GraphError;
use super::graph::Graph;
use crate::core::ids::NodeId;
use crate::core::literal::LiteralKind;
use crate::core::value::Value;
use std::collections::HashSet;
use tracing::trace;

impl Graph {
    /// Returns the value of `id`, evaluating and caching stale operators on the way.
    ///
    /// A present cache is returned as is, even if it was seeded externally. An
    /// operator with unbound inputs fails with [`GraphError::MissingArgument`];
    /// errors from inputs (e.g. an unset leaf) propagate unchanged.
    pub fn value(&mut self, id: NodeId) -> Result<&Value, GraphError> {
        self.evaluate(id)?;
        let label = self.label(id);
        self.literal(id)?
            .cached_value()
            .ok_or(GraphError::UnsetValue { node: label })
    }

    /// Stores a new value on an argument and invalidates everything downstream.
    pub fn set_value(&mut self, id: NodeId, value: impl Into<Value>) -> Result<(), GraphError> {
        self.store_argument_value(id, Some(value.into()))
    }

    /// Removes the value of an argument; reads through it fail until it is set again.
    pub fn clear_value(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.store_argument_value(id, None)
    }

    /// Places `value` in an operator's cache without evaluating it.
    ///
    /// Reads return the seeded value until the cache is invalidated by an
    /// upstream change. Nodes consuming the operator are invalidated.
    pub fn seed_cache(&mut self, id: NodeId, value: impl Into<Value>) -> Result<(), GraphError> {
        let label = self.label(id);
        let literal = self.literal_mut(id)?;
        if literal.as_operator().is_none() {
            return Err(GraphError::NotAnOperator { node: label });
        }
        literal.cache = Some(value.into());
        self.invalidate_dependents(id);
        Ok(())
    }

    /// Clears the cache of `id` and of every node downstream of it.
    ///
    /// Returns the number of caches that held a value.
    pub fn invalidate(&mut self, id: NodeId) -> Result<usize, GraphError> {
        let cleared = usize::from(self.literal_mut(id)?.cache.take().is_some());
        Ok(cleared + self.invalidate_dependents(id))
    }

    fn store_argument_value(&mut self, id: NodeId, value: Option<Value>) -> Result<(), GraphError> {
        let label = self.label(id);
        match &mut self.literal_mut(id)?.kind {
            LiteralKind::Argument(arg) => arg.value = value,
            LiteralKind::Operator(_) => return Err(GraphError::NotAnArgument { node: label }),
        }
        self.invalidate_dependents(id);
        Ok(())
    }

    /// Walks the recorded dependents of `id` and clears each reachable cache once.
    fn invalidate_dependents(&mut self, id: NodeId) -> usize {
        let mut stack: Vec<NodeId> = self.dependents(id).to_vec();
        let mut visited = HashSet::new();
        let mut cleared = 0;

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(literal) = self.literals.get_mut(current) {
                if literal.cache.take().is_some() {
                    cleared += 1;
                }
            }
            stack.extend(self.dependents(current).iter().copied());
        }

        trace!(
            "Invalidated {} cached value(s) downstream of {}",
            cleared,
            self.label(id)
        );
        cleared
    }

    /// Brings the cache of `id` up to date with a post-order walk over its inputs.
    ///
    /// The walk keeps its own stack, so chain depth is bounded by memory rather
    /// than by the thread's call stack. Inputs are visited in binding order and
    /// the first failure stops the walk.
    fn evaluate(&mut self, id: NodeId) -> Result<(), GraphError> {
        let mut stack = vec![Step::Visit(id)];

        while let Some(step) = stack.pop() {
            let node = match step {
                Step::Visit(node) => node,
                Step::Compute(node) => {
                    self.compute(node)?;
                    continue;
                }
            };

            let literal = self.literal(node)?;
            match &literal.kind {
                LiteralKind::Argument(arg) => {
                    if arg.value.is_none() {
                        return Err(GraphError::UnsetValue {
                            node: self.label(node),
                        });
                    }
                }
                LiteralKind::Operator(op) => {
                    if literal.cache.is_some() {
                        continue;
                    }
                    if !op.is_fully_bound() {
                        return Err(GraphError::MissingArgument {
                            node: self.label(node),
                            bound: op.args().len(),
                            required: op.nin().required(),
                        });
                    }
                    stack.push(Step::Compute(node));
                    stack.extend(op.args().iter().rev().map(|&arg| Step::Visit(arg)));
                }
            }
        }
        Ok(())
    }

    /// Applies the operation of `id` to its already resolved inputs and caches the result.
    fn compute(&mut self, id: NodeId) -> Result<(), GraphError> {
        let literal = self.literal(id)?;
        let Some(op) = literal.as_operator() else {
            return Ok(());
        };
        if literal.cache.is_some() {
            return Ok(());
        }

        let inputs = op
            .args()
            .iter()
            .map(|&arg| {
                self.literals
                    .get(arg)
                    .and_then(|lit| lit.cached_value())
                    .ok_or_else(|| GraphError::UnsetValue {
                        node: self.label(arg),
                    })
            })
            .collect::<Result<Vec<&Value>, GraphError>>()?;
        let result = op
            .operation()
            .apply(&inputs)
            .map_err(|source| GraphError::Operation {
                node: self.label(id),
                source,
            })?;

        trace!("Evaluated {} ('{}')", self.label(id), op.symbol());
        self.literal_mut(id)?.cache = Some(result);
        Ok(())
    }
}

/// Pending work in [`Graph::evaluate`].
enum Step {
    /// Check the node and schedule its stale inputs.
    Visit(NodeId),
    /// All inputs are resolved; run the operation.
    Compute(NodeId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::convolution::ZeroSumPolicy;
    use crate::core::operation::{Arity, Operation};
    use crate::core::value::OperationError;
    use crate::engine::config::GraphConfigBuilder;
    use std::cell::Cell;
    use std::rc::Rc;

    fn add_pair(graph: &mut Graph, a: f64, b: f64) -> (NodeId, NodeId, NodeId) {
        let op = graph.add_operator(Some("add"), Operation::add());
        let a = graph.add_argument(Some("a"), Some(Value::from(a)));
        let b = graph.add_argument(Some("b"), Some(Value::from(b)));
        graph.add_literal(op, a).unwrap();
        graph.add_literal(op, b).unwrap();
        (op, a, b)
    }

    /// An elementwise add that counts how many times it runs.
    fn counting_add(counter: Rc<Cell<usize>>) -> Operation {
        Operation::new("+", Arity::Fixed(2), move |inputs| {
            counter.set(counter.get() + 1);
            inputs[0].zip_with(inputs[1], |x, y| x + y)
        })
    }

    mod arguments {
        use super::*;

        #[test]
        fn unset_argument_fails_to_evaluate() {
            let mut graph = Graph::new();
            let a = graph.add_argument(None, None);
            assert!(matches!(
                graph.value(a),
                Err(GraphError::UnsetValue { .. })
            ));
        }

        #[test]
        fn set_value_is_returned_verbatim() {
            let mut graph = Graph::new();
            let a = graph.add_argument(None, None);
            graph.set_value(a, 3.14).unwrap();
            assert_eq!(graph.value(a).unwrap(), &Value::from(3.14));

            graph.set_value(a, vec![1.0, 2.0]).unwrap();
            assert_eq!(graph.value(a).unwrap(), &Value::from(vec![1.0, 2.0]));
        }

        #[test]
        fn clear_value_makes_argument_unset_again() {
            let mut graph = Graph::new();
            let a = graph.add_argument(Some("a"), Some(Value::from(1.0)));
            graph.clear_value(a).unwrap();
            assert_eq!(
                graph.value(a),
                Err(GraphError::UnsetValue {
                    node: "a".to_string()
                })
            );
        }

        #[test]
        fn set_value_on_operator_is_rejected() {
            let mut graph = Graph::new();
            let op = graph.add_operator(Some("add"), Operation::add());
            assert_eq!(
                graph.set_value(op, 1.0),
                Err(GraphError::NotAnArgument {
                    node: "add".to_string()
                })
            );
        }

        #[test]
        fn constant_flag_does_not_freeze_storage() {
            let mut graph = Graph::new();
            let a = graph.add_argument(None, Some(Value::from(1.0)));
            graph.set_constant(a, true).unwrap();
            graph.set_value(a, 2.0).unwrap();
            assert_eq!(graph.value(a).unwrap(), &Value::from(2.0));
        }
    }

    mod operators {
        use super::*;

        #[test]
        fn operator_adds_its_inputs() {
            let mut graph = Graph::new();
            let (op, _, _) = add_pair(&mut graph, 0.0, 0.0);
            assert_eq!(graph.value(op).unwrap(), &Value::from(0.0));
        }

        #[test]
        fn changing_an_input_invalidates_the_cache() {
            let mut graph = Graph::new();
            let (op, a, b) = add_pair(&mut graph, 0.0, 0.0);
            graph.value(op).unwrap();

            graph.set_value(a, 4.0).unwrap();
            assert!(graph.cached_value(op).is_none());
            assert_eq!(graph.value(op).unwrap(), &Value::from(4.0));

            graph.set_value(b, 2.0).unwrap();
            assert!(graph.cached_value(op).is_none());
            assert_eq!(graph.value(op).unwrap(), &Value::from(6.0));

            graph.set_value(b, 10.0).unwrap();
            assert_eq!(graph.value(op).unwrap(), &Value::from(14.0));
        }

        #[test]
        fn value_is_cached_between_reads() {
            let counter = Rc::new(Cell::new(0));
            let mut graph = Graph::new();
            let op = graph.add_operator(None, counting_add(counter.clone()));
            let a = graph.add_argument(None, Some(Value::from(1.0)));
            let b = graph.add_argument(None, Some(Value::from(2.0)));
            graph.add_literal(op, a).unwrap();
            graph.add_literal(op, b).unwrap();

            assert_eq!(graph.value(op).unwrap(), &Value::from(3.0));
            assert_eq!(graph.value(op).unwrap(), &Value::from(3.0));
            assert_eq!(counter.get(), 1);
        }

        #[test]
        fn missing_inputs_fail_even_when_bound_inputs_resolve() {
            let mut graph = Graph::new();
            let op = graph.add_operator(Some("add"), Operation::add());
            assert_eq!(
                graph.value(op),
                Err(GraphError::MissingArgument {
                    node: "add".to_string(),
                    bound: 0,
                    required: 2,
                })
            );

            let a = graph.add_argument(Some("a"), Some(Value::from(1.0)));
            graph.add_literal(op, a).unwrap();
            assert!(matches!(
                graph.value(op),
                Err(GraphError::MissingArgument { bound: 1, .. })
            ));
        }

        #[test]
        fn seeded_cache_is_returned_until_invalidated() {
            let mut graph = Graph::new();
            let op = graph.add_operator(Some("add"), Operation::add());
            graph.seed_cache(op, 1.0).unwrap();
            assert_eq!(graph.value(op).unwrap(), &Value::from(1.0));

            let a = graph.add_argument(Some("a"), Some(Value::from(0.0)));
            let b = graph.add_argument(Some("b"), Some(Value::from(0.0)));
            graph.add_literal(op, a).unwrap();
            assert!(matches!(
                graph.value(op),
                Err(GraphError::MissingArgument { .. })
            ));

            graph.add_literal(op, b).unwrap();
            assert_eq!(graph.value(op).unwrap(), &Value::from(0.0));

            graph.seed_cache(op, 42.0).unwrap();
            assert_eq!(graph.value(op).unwrap(), &Value::from(42.0));

            graph.set_value(a, 1.0).unwrap();
            graph.set_value(b, 2.0).unwrap();
            assert_eq!(graph.value(op).unwrap(), &Value::from(3.0));
        }

        #[test]
        fn seed_cache_on_argument_is_rejected() {
            let mut graph = Graph::new();
            let a = graph.add_argument(Some("a"), None);
            assert!(matches!(
                graph.seed_cache(a, 1.0),
                Err(GraphError::NotAnOperator { .. })
            ));
        }

        #[test]
        fn unset_leaf_error_propagates_through_operators() {
            let mut graph = Graph::new();
            let (op, a, _) = add_pair(&mut graph, 1.0, 2.0);
            let neg = graph.add_operator(Some("neg"), Operation::negate());
            graph.add_literal(neg, op).unwrap();
            assert_eq!(graph.value(neg).unwrap(), &Value::from(-3.0));

            graph.clear_value(a).unwrap();
            assert_eq!(
                graph.value(neg),
                Err(GraphError::UnsetValue {
                    node: "a".to_string()
                })
            );
        }

        #[test]
        fn operation_failure_names_the_operator() {
            let mut graph = Graph::new();
            let op = graph.add_operator(Some("add"), Operation::add());
            let a = graph.add_argument(None, Some(Value::from(vec![1.0, 2.0])));
            let b = graph.add_argument(None, Some(Value::from(vec![1.0, 2.0, 3.0])));
            graph.add_literal(op, a).unwrap();
            graph.add_literal(op, b).unwrap();

            assert_eq!(
                graph.value(op),
                Err(GraphError::Operation {
                    node: "add".to_string(),
                    source: OperationError::ShapeMismatch { left: 2, right: 3 },
                })
            );
        }

        #[test]
        fn variadic_sum_evaluates_all_inputs() {
            let mut graph = Graph::new();
            let op = graph.add_operator(None, Operation::sum());
            assert!(matches!(
                graph.value(op),
                Err(GraphError::MissingArgument { required: 1, .. })
            ));
            for v in [1.0, 2.0, 3.0] {
                let arg = graph.add_argument(None, Some(Value::from(v)));
                graph.add_literal(op, arg).unwrap();
            }
            assert_eq!(graph.value(op).unwrap(), &Value::from(6.0));
        }
    }

    mod deep_graphs {
        use super::*;
        use std::thread;

        const DEPTH: usize = 8_192;

        /// `-(-(...-(leaf)))` with `depth` negations, built bottom-up.
        fn negation_chain(graph: &mut Graph, leaf: NodeId, depth: usize) -> NodeId {
            let mut top = leaf;
            for _ in 0..depth {
                let neg = graph.add_operator(None, Operation::negate());
                graph.add_literal(neg, top).unwrap();
                top = neg;
            }
            top
        }

        /// Runs `f` on a thread whose stack is far too small for one frame per level.
        fn on_small_stack<F: FnOnce() + Send + 'static>(f: F) {
            thread::Builder::new()
                .stack_size(256 * 1024)
                .spawn(f)
                .unwrap()
                .join()
                .unwrap();
        }

        #[test]
        fn deep_chain_evaluates_without_exhausting_the_stack() {
            on_small_stack(|| {
                let mut graph = Graph::new();
                let leaf = graph.add_argument(Some("x"), Some(Value::from(1.5)));
                let top = negation_chain(&mut graph, leaf, DEPTH + 1);

                assert_eq!(graph.value(top).unwrap(), &Value::from(-1.5));

                graph.set_value(leaf, 2.0).unwrap();
                assert!(graph.cached_value(top).is_none());
                assert_eq!(graph.value(top).unwrap(), &Value::from(-2.0));
            });
        }

        #[test]
        fn unset_leaf_at_the_bottom_of_a_deep_chain_is_reported() {
            on_small_stack(|| {
                let mut graph = Graph::new();
                let leaf = graph.add_argument(Some("x"), None);
                let top = negation_chain(&mut graph, leaf, DEPTH);

                assert_eq!(
                    graph.value(top),
                    Err(GraphError::UnsetValue {
                        node: "x".to_string()
                    })
                );
            });
        }

        #[test]
        fn shared_inputs_are_computed_once_per_pass() {
            let counter = Rc::new(Cell::new(0));
            let mut graph = Graph::new();
            let a = graph.add_argument(None, Some(Value::from(1.0)));
            let mut top = a;
            for _ in 0..64 {
                let doubled = graph.add_operator(None, counting_add(counter.clone()));
                graph.add_literal(doubled, top).unwrap();
                graph.add_literal(doubled, top).unwrap();
                top = doubled;
            }

            assert_eq!(graph.value(top).unwrap(), &Value::from(2f64.powi(64)));
            assert_eq!(counter.get(), 64);
        }

        #[test]
        fn first_failing_input_in_binding_order_is_reported() {
            let mut graph = Graph::new();
            let op = graph.add_operator(None, Operation::add());
            let left = graph.add_argument(Some("left"), None);
            let right = graph.add_argument(Some("right"), None);
            graph.add_literal(op, left).unwrap();
            graph.add_literal(op, right).unwrap();

            assert_eq!(
                graph.value(op),
                Err(GraphError::UnsetValue {
                    node: "left".to_string()
                })
            );
        }
    }

    mod invalidation {
        use super::*;

        struct Diamond {
            graph: Graph,
            a: NodeId,
            r: NodeId,
            r_count: Rc<Cell<usize>>,
        }

        /// `p = a + 1`, `q = a * 2`, `r = p + q`.
        fn diamond() -> Diamond {
            let r_count = Rc::new(Cell::new(0));
            let mut graph = Graph::new();
            let a = graph.add_argument(Some("a"), Some(Value::from(1.0)));
            let one = graph.add_argument(None, Some(Value::from(1.0)));
            let two = graph.add_argument(None, Some(Value::from(2.0)));
            let p = graph.add_operator(Some("p"), Operation::add());
            let q = graph.add_operator(Some("q"), Operation::multiply());
            let r = graph.add_operator(Some("r"), counting_add(r_count.clone()));
            graph.add_literal(p, a).unwrap();
            graph.add_literal(p, one).unwrap();
            graph.add_literal(q, a).unwrap();
            graph.add_literal(q, two).unwrap();
            graph.add_literal(r, p).unwrap();
            graph.add_literal(r, q).unwrap();
            Diamond {
                graph,
                a,
                r,
                r_count,
            }
        }

        #[test]
        fn diamond_reflects_new_value_on_next_read() {
            let mut d = diamond();
            assert_eq!(d.graph.value(d.r).unwrap(), &Value::from(4.0));

            d.graph.set_value(d.a, 3.0).unwrap();
            assert_eq!(d.graph.value(d.r).unwrap(), &Value::from(10.0));

            d.graph.set_value(d.a, -1.0).unwrap();
            assert_eq!(d.graph.value(d.r).unwrap(), &Value::from(-2.0));
        }

        #[test]
        fn diamond_invalidates_each_node_once_per_change() {
            let mut d = diamond();
            d.graph.value(d.r).unwrap();
            assert_eq!(d.r_count.get(), 1);

            // p, q and r hold caches; each is cleared exactly once.
            assert_eq!(d.graph.invalidate_dependents(d.a), 3);

            d.graph.value(d.r).unwrap();
            d.graph.value(d.r).unwrap();
            assert_eq!(d.r_count.get(), 2);

            d.graph.set_value(d.a, 5.0).unwrap();
            d.graph.set_value(d.a, 6.0).unwrap();
            assert_eq!(d.graph.value(d.r).unwrap(), &Value::from(19.0));
            assert_eq!(d.r_count.get(), 3);
        }

        #[test]
        fn invalidation_reaches_through_chains() {
            let mut graph = Graph::new();
            let (op, a, _) = add_pair(&mut graph, 1.0, 1.0);
            let neg = graph.add_operator(None, Operation::negate());
            let exp = graph.add_operator(None, Operation::exp());
            graph.add_literal(neg, op).unwrap();
            graph.add_literal(exp, neg).unwrap();
            graph.value(exp).unwrap();

            graph.set_value(a, 0.0).unwrap();
            assert!(graph.cached_value(op).is_none());
            assert!(graph.cached_value(neg).is_none());
            assert!(graph.cached_value(exp).is_none());
            assert_eq!(graph.value(exp).unwrap(), &Value::from((-1.0f64).exp()));
        }

        #[test]
        fn rewiring_an_operator_invalidates_its_consumers() {
            let mut graph = Graph::new();
            let sum = graph.add_operator(None, Operation::sum());
            let a = graph.add_argument(None, Some(Value::from(1.0)));
            graph.add_literal(sum, a).unwrap();
            let neg = graph.add_operator(None, Operation::negate());
            graph.add_literal(neg, sum).unwrap();
            assert_eq!(graph.value(neg).unwrap(), &Value::from(-1.0));

            let b = graph.add_argument(None, Some(Value::from(4.0)));
            graph.add_literal(sum, b).unwrap();
            assert!(graph.cached_value(neg).is_none());
            assert_eq!(graph.value(neg).unwrap(), &Value::from(-5.0));
        }

        #[test]
        fn explicit_invalidate_counts_cleared_caches() {
            let mut graph = Graph::new();
            let (op, _, _) = add_pair(&mut graph, 1.0, 2.0);
            assert_eq!(graph.invalidate(op).unwrap(), 0);
            graph.value(op).unwrap();
            assert_eq!(graph.invalidate(op).unwrap(), 1);
            assert!(graph.cached_value(op).is_none());
        }
    }

    mod convolution {
        use super::*;

        #[test]
        fn convolution_operator_preserves_first_input_total() {
            let mut graph = Graph::new();
            let signal = graph.add_argument(
                Some("g1"),
                Some(Value::from(vec![0.0, 1.0, 3.0, 1.0, 0.0])),
            );
            let kernel = graph.add_argument(Some("g2"), Some(Value::from(vec![1.0, 2.0, 1.0])));
            let conv = graph.add_convolution_operator(None);
            graph.add_literal(conv, signal).unwrap();
            graph.add_literal(conv, kernel).unwrap();

            let result = graph.value(conv).unwrap().clone();
            assert_eq!(result.len(), 5);
            assert!((result.sum() - 5.0).abs() < 1e-12);

            graph.set_value(signal, vec![0.0, 2.0, 6.0, 2.0, 0.0]).unwrap();
            assert!((graph.value(conv).unwrap().sum() - 10.0).abs() < 1e-12);
        }

        #[test]
        fn degenerate_convolution_follows_error_policy() {
            let mut graph = Graph::new();
            let signal = graph.add_argument(None, Some(Value::from(vec![1.0, -1.0])));
            let kernel = graph.add_argument(None, Some(Value::from(vec![1.0])));
            let conv = graph.add_convolution_operator(Some("broaden"));
            graph.add_literal(conv, signal).unwrap();
            graph.add_literal(conv, kernel).unwrap();

            assert!(matches!(
                graph.value(conv),
                Err(GraphError::Operation {
                    source: OperationError::DegenerateNormalization { .. },
                    ..
                })
            ));
        }

        #[test]
        fn degenerate_convolution_follows_nan_policy() {
            let config = GraphConfigBuilder::new()
                .zero_sum_policy(ZeroSumPolicy::Nan)
                .build();
            let mut graph = Graph::with_config(config);
            let signal = graph.add_argument(None, Some(Value::from(vec![1.0, -1.0])));
            let kernel = graph.add_argument(None, Some(Value::from(vec![1.0])));
            let conv = graph.add_convolution_operator(None);
            graph.add_literal(conv, signal).unwrap();
            graph.add_literal(conv, kernel).unwrap();

            let result = graph.value(conv).unwrap();
            assert!(result.as_array().unwrap().iter().all(|v| v.is_nan()));
        }
    }
}
