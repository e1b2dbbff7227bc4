use nalgebra::DVector;
use thiserror::Error;

/// A numeric value flowing through the expression graph.
///
/// Leaves hold either a single number or a sampled profile; operators combine
/// them elementwise, broadcasting scalars against arrays.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Array(DVector<f64>),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OperationError {
    #[error("Shape mismatch: cannot combine arrays of length {left} and {right}")]
    ShapeMismatch { left: usize, right: usize },

    #[error("Operation '{symbol}' expected {expected} input(s), got {found}")]
    InputCount {
        symbol: String,
        expected: usize,
        found: usize,
    },

    #[error("Operation '{symbol}' requires a non-empty array input")]
    EmptyInput { symbol: String },

    #[error("Cannot normalize '{symbol}': {quantity} has no finite nonzero sum")]
    DegenerateNormalization {
        symbol: String,
        quantity: &'static str,
    },
}

impl Value {
    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Scalar(_))
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&DVector<f64>> {
        match self {
            Value::Scalar(_) => None,
            Value::Array(a) => Some(a),
        }
    }

    /// Number of samples; a scalar counts as one.
    pub fn len(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::Array(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sum(&self) -> f64 {
        match self {
            Value::Scalar(v) => *v,
            Value::Array(a) => a.sum(),
        }
    }

    /// Promotes the value to an array, turning a scalar into a single sample.
    pub fn to_array(&self) -> DVector<f64> {
        match self {
            Value::Scalar(v) => DVector::from_element(1, *v),
            Value::Array(a) => a.clone(),
        }
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Value {
        match self {
            Value::Scalar(v) => Value::Scalar(f(*v)),
            Value::Array(a) => Value::Array(a.map(f)),
        }
    }

    /// Combines two values elementwise, broadcasting a scalar over an array.
    pub fn zip_with(
        &self,
        other: &Value,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Value, OperationError> {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(f(*a, *b))),
            (Value::Scalar(a), Value::Array(b)) => Ok(Value::Array(b.map(|y| f(*a, y)))),
            (Value::Array(a), Value::Scalar(b)) => Ok(Value::Array(a.map(|x| f(x, *b)))),
            (Value::Array(a), Value::Array(b)) => {
                if a.len() != b.len() {
                    return Err(OperationError::ShapeMismatch {
                        left: a.len(),
                        right: b.len(),
                    });
                }
                Ok(Value::Array(a.zip_map(b, f)))
            }
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<DVector<f64>> for Value {
    fn from(v: DVector<f64>) -> Self {
        Value::Array(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Array(DVector::from_vec(v))
    }
}

impl From<&[f64]> for Value {
    fn from(v: &[f64]) -> Self {
        Value::Array(DVector::from_column_slice(v))
    }
}
