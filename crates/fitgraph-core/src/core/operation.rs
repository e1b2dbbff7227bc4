use super::convolution::{self, ZeroSumPolicy};
use super::value::{OperationError, Value};
use std::fmt;
use std::rc::Rc;

type OperationFn = dyn Fn(&[&Value]) -> Result<Value, OperationError>;

/// Number of inputs an operator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many inputs, bound in order.
    Fixed(usize),
    /// Any number of inputs; at least one is needed to evaluate.
    Variadic,
}

impl Arity {
    /// Returns `true` when `bound` more inputs cannot be accepted.
    pub fn is_full(&self, bound: usize) -> bool {
        match self {
            Arity::Fixed(n) => bound >= *n,
            Arity::Variadic => false,
        }
    }

    /// Returns `true` when `bound` inputs are enough to evaluate.
    pub fn is_satisfied(&self, bound: usize) -> bool {
        match self {
            Arity::Fixed(n) => bound == *n,
            Arity::Variadic => bound > 0,
        }
    }

    /// The minimum number of inputs required for evaluation.
    pub fn required(&self) -> usize {
        match self {
            Arity::Fixed(n) => *n,
            Arity::Variadic => 1,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Fixed(n) => write!(f, "{}", n),
            Arity::Variadic => write!(f, "variadic"),
        }
    }
}

/// A numeric function together with its display symbol and arity metadata.
///
/// Operators do not subclass per function; they hold an `Operation`. The
/// function receives the resolved input values in binding order.
#[derive(Clone)]
pub struct Operation {
    symbol: String,
    arity: Arity,
    nout: usize,
    func: Rc<OperationFn>,
}

impl Operation {
    pub fn new<F>(symbol: impl Into<String>, arity: Arity, func: F) -> Self
    where
        F: Fn(&[&Value]) -> Result<Value, OperationError> + 'static,
    {
        Self {
            symbol: symbol.into(),
            arity,
            nout: 1,
            func: Rc::new(func),
        }
    }

    pub fn with_nout(mut self, nout: usize) -> Self {
        self.nout = nout;
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn nout(&self) -> usize {
        self.nout
    }

    pub fn apply(&self, inputs: &[&Value]) -> Result<Value, OperationError> {
        (self.func)(inputs)
    }

    /// Builds an elementwise two-input operation with scalar broadcasting.
    pub fn binary(symbol: &str, f: fn(f64, f64) -> f64) -> Self {
        let name = symbol.to_string();
        Self::new(symbol, Arity::Fixed(2), move |inputs| {
            check_count(&name, 2, inputs)?;
            inputs[0].zip_with(inputs[1], f)
        })
    }

    /// Builds an elementwise single-input operation.
    pub fn unary(symbol: &str, f: fn(f64) -> f64) -> Self {
        let name = symbol.to_string();
        Self::new(symbol, Arity::Fixed(1), move |inputs| {
            check_count(&name, 1, inputs)?;
            Ok(inputs[0].map(f))
        })
    }

    pub fn add() -> Self {
        Self::binary("+", |a, b| a + b)
    }

    pub fn subtract() -> Self {
        Self::binary("-", |a, b| a - b)
    }

    pub fn multiply() -> Self {
        Self::binary("*", |a, b| a * b)
    }

    pub fn divide() -> Self {
        Self::binary("/", |a, b| a / b)
    }

    pub fn power() -> Self {
        Self::binary("**", f64::powf)
    }

    pub fn negate() -> Self {
        Self::unary("-", |a| -a)
    }

    pub fn exp() -> Self {
        Self::unary("exp", f64::exp)
    }

    /// Elementwise sum of any number of inputs.
    pub fn sum() -> Self {
        Self::new("sum", Arity::Variadic, |inputs| {
            let (first, rest) = inputs.split_first().ok_or(OperationError::InputCount {
                symbol: "sum".to_string(),
                expected: 1,
                found: 0,
            })?;
            rest.iter()
                .try_fold((*first).clone(), |acc, v| acc.zip_with(v, |a, b| a + b))
        })
    }

    /// Renormalized discrete convolution of two profiles.
    pub fn convolution(policy: ZeroSumPolicy) -> Self {
        Self::new(
            convolution::CONVOLUTION_SYMBOL,
            Arity::Fixed(2),
            move |inputs| {
                check_count(convolution::CONVOLUTION_SYMBOL, 2, inputs)?;
                convolution::convolve(inputs[0], inputs[1], policy).map(Value::Array)
            },
        )
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("symbol", &self.symbol)
            .field("arity", &self.arity)
            .field("nout", &self.nout)
            .finish_non_exhaustive()
    }
}

fn check_count(symbol: &str, expected: usize, inputs: &[&Value]) -> Result<(), OperationError> {
    if inputs.len() != expected {
        return Err(OperationError::InputCount {
            symbol: symbol.to_string(),
            expected,
            found: inputs.len(),
        });
    }
    Ok(())
}
