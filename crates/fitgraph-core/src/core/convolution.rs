use super::value::{OperationError, Value};
use nalgebra::DVector;
use serde::Deserialize;
use tracing::warn;

pub const CONVOLUTION_SYMBOL: &str = "convolve";

/// What to do when the convolution cannot be renormalized because a sum is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroSumPolicy {
    /// Fail the evaluation with [`OperationError::DegenerateNormalization`].
    #[default]
    Error,
    /// Produce a profile filled with NaN and keep going.
    Nan,
}

/// Convolves `signal` with `kernel` and maps the result back onto the grid of `signal`.
///
/// The full discrete convolution is re-sampled (linear interpolation, clamped at
/// the ends) so that its centroid lands on the centroid of `signal`, then scaled
/// so that its total equals the total of `signal`. Broadening a profile with an
/// instrument kernel therefore keeps both its position and its integrated
/// intensity. Scalars are treated as single-sample profiles.
pub fn convolve(
    signal: &Value,
    kernel: &Value,
    policy: ZeroSumPolicy,
) -> Result<DVector<f64>, OperationError> {
    let signal = signal.to_array();
    let kernel = kernel.to_array();

    if signal.is_empty() || kernel.is_empty() {
        return Err(OperationError::EmptyInput {
            symbol: CONVOLUTION_SYMBOL.to_string(),
        });
    }

    let raw = full_convolution(&signal, &kernel);
    let total = signal.sum();

    let (signal_centroid, raw_centroid) = match (centroid(&signal), centroid(&raw)) {
        (Some(s), Some(r)) => (s, r),
        (None, _) => return degenerate(policy, signal.len(), "first input"),
        (_, None) => return degenerate(policy, signal.len(), "raw convolution"),
    };

    let shift = raw_centroid - signal_centroid;
    let resampled = DVector::from_iterator(
        signal.len(),
        (0..signal.len()).map(|i| interpolate(&raw, i as f64 + shift)),
    );

    let norm = resampled.sum();
    if norm == 0.0 || !norm.is_finite() {
        return degenerate(policy, signal.len(), "raw convolution");
    }

    Ok(resampled * (total / norm))
}

fn full_convolution(a: &DVector<f64>, b: &DVector<f64>) -> DVector<f64> {
    let mut out = DVector::zeros(a.len() + b.len() - 1);
    for (i, &x) in a.iter().enumerate() {
        if x == 0.0 {
            continue;
        }
        for (j, &y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Intensity-weighted mean sample index, or `None` when the profile sums to zero
/// or carries non-finite samples.
fn centroid(v: &DVector<f64>) -> Option<f64> {
    let total = v.sum();
    if total == 0.0 || !total.is_finite() {
        return None;
    }
    let moment: f64 = v.iter().enumerate().map(|(i, &y)| i as f64 * y).sum();
    Some(moment / total).filter(|c| c.is_finite())
}

fn interpolate(samples: &DVector<f64>, x: f64) -> f64 {
    let last = samples.len() - 1;
    if last == 0 || !x.is_finite() || x <= 0.0 {
        return samples[0];
    }
    if x >= last as f64 {
        return samples[last];
    }
    let lo = x.floor() as usize;
    let frac = x - lo as f64;
    samples[lo] * (1.0 - frac) + samples[lo + 1] * frac
}

fn degenerate(
    policy: ZeroSumPolicy,
    len: usize,
    quantity: &'static str,
) -> Result<DVector<f64>, OperationError> {
    match policy {
        ZeroSumPolicy::Error => Err(OperationError::DegenerateNormalization {
            symbol: CONVOLUTION_SYMBOL.to_string(),
            quantity,
        }),
        ZeroSumPolicy::Nan => {
            warn!(
                "Convolution normalization failed ({} has no finite nonzero sum); returning NaN profile",
                quantity
            );
            Ok(DVector::from_element(len, f64::NAN))
        }
    }
}
