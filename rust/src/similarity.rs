//! Similarity engine: cosine similarity, MSE and MAE between two buffers
//!
//! Inputs of different lengths are compared over their common prefix. There
//! is no alignment or resampling; element `i` of one buffer is always paired
//! with element `i` of the other.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::decoder::{self, DecodeError, NumericBuffer};
use crate::display::{format_cosine, format_metric};
use crate::encoding::ElementEncoding;

/// Added to the cosine denominator so it can never be zero
pub const COSINE_EPSILON: f64 = 1e-10;

/// Absolute tolerance below which a sample counts as zero when deciding
/// whether a whole sequence is numerically all-zero
pub const ZERO_TOLERANCE: f64 = 1e-8;

/// Error type for comparisons
#[derive(Debug, Error)]
pub enum CompareError {
    #[error("nothing to compare: buffers have lengths {left} and {right}")]
    EmptyComparison { left: usize, right: usize },

    #[error("metric computation failed: {reason}")]
    MetricComputation { reason: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Result of comparing two buffers
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonResult {
    /// In [-1, 1] up to rounding; exactly 0.0 if either side is all-zero
    pub cosine_similarity: f64,
    pub mse: f64,
    pub mae: f64,
    /// Number of leading elements that were compared
    pub truncated_length: usize,
    /// Lengths before truncation, in argument order
    pub original_lengths: (usize, usize),
}

impl ComparisonResult {
    /// True if the inputs had different lengths
    pub fn was_truncated(&self) -> bool {
        self.original_lengths.0 != self.original_lengths.1
    }

    /// Display line, e.g. `Cos: 0.998, MSE: 0.0012, MAE: 0.000031`
    pub fn summary(&self) -> String {
        format!(
            "Cos: {}, MSE: {}, MAE: {}",
            format_cosine(self.cosine_similarity),
            format_metric(self.mse),
            format_metric(self.mae)
        )
    }
}

fn check_lengths(a: &[f64], b: &[f64]) -> Result<(), CompareError> {
    if a.len() != b.len() {
        return Err(CompareError::MetricComputation {
            reason: format!("length mismatch: {} vs {}", a.len(), b.len()),
        });
    }
    if a.is_empty() {
        return Err(CompareError::MetricComputation { reason: "empty input".to_string() });
    }
    Ok(())
}

fn ensure_finite(name: &str, value: f64) -> Result<f64, CompareError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CompareError::MetricComputation {
            reason: format!("{name} is not finite ({value})"),
        })
    }
}

#[inline]
fn is_all_zero(values: &[f64]) -> bool {
    values.iter().all(|v| v.abs() <= ZERO_TOLERANCE)
}

/// Cosine similarity of two equal-length sequences.
///
/// Returns exactly 0.0 when either side is numerically all-zero instead of
/// the epsilon-guarded ratio.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64, CompareError> {
    check_lengths(a, b)?;
    if is_all_zero(a) || is_all_zero(b) {
        return Ok(0.0);
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt() + COSINE_EPSILON;
    ensure_finite("cosine similarity", dot / denom)
}

/// Mean of squared element differences, computed in f64.
pub fn mean_squared_error(a: &[f64], b: &[f64]) -> Result<f64, CompareError> {
    check_lengths(a, b)?;
    let sum: f64 = a.iter().zip(b).map(|(&x, &y)| (x - y) * (x - y)).sum();
    ensure_finite("mean squared error", sum / a.len() as f64)
}

/// Mean of absolute element differences, computed in f64.
pub fn mean_absolute_error(a: &[f64], b: &[f64]) -> Result<f64, CompareError> {
    check_lengths(a, b)?;
    let sum: f64 = a.iter().zip(b).map(|(&x, &y)| (x - y).abs()).sum();
    ensure_finite("mean absolute error", sum / a.len() as f64)
}

/// Compare two slices over their common prefix.
pub fn compare_slices(a: &[f64], b: &[f64]) -> Result<ComparisonResult, CompareError> {
    let min_len = a.len().min(b.len());
    if min_len == 0 {
        return Err(CompareError::EmptyComparison { left: a.len(), right: b.len() });
    }
    if a.len() != b.len() {
        info!(left = a.len(), right = b.len(), min_len, "truncating comparison to common prefix");
    }

    let (ta, tb) = (&a[..min_len], &b[..min_len]);
    let result = ComparisonResult {
        cosine_similarity: cosine_similarity(ta, tb)?,
        mse: mean_squared_error(ta, tb)?,
        mae: mean_absolute_error(ta, tb)?,
        truncated_length: min_len,
        original_lengths: (a.len(), b.len()),
    };
    debug!(
        cosine = result.cosine_similarity,
        mse = result.mse,
        mae = result.mae,
        min_len,
        "compared buffers"
    );
    Ok(result)
}

/// Compare two decoded buffers.
///
/// The buffers may use different encodings; both are already widened to f64.
pub fn compare(a: &NumericBuffer, b: &NumericBuffer) -> Result<ComparisonResult, CompareError> {
    compare_slices(a.values(), b.values())
}

/// Decode both files and compare them.
pub fn compare_files(
    path_a: impl AsRef<Path>,
    encoding_a: ElementEncoding,
    path_b: impl AsRef<Path>,
    encoding_b: ElementEncoding,
) -> Result<ComparisonResult, CompareError> {
    let a = decoder::decode(path_a, encoding_a)?;
    let b = decoder::decode(path_b, encoding_b)?;
    compare(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn buf(values: &[f64]) -> NumericBuffer {
        NumericBuffer::from_values(ElementEncoding::Float64, values.to_vec())
    }

    #[test]
    fn test_self_comparison() {
        let a = buf(&[1.0, -2.0, 3.5, 0.25]);
        let r = compare(&a, &a).unwrap();
        assert_abs_diff_eq!(r.cosine_similarity, 1.0, epsilon = 1e-9);
        assert_eq!(r.mse, 0.0);
        assert_eq!(r.mae, 0.0);
        assert!(!r.was_truncated());
    }

    #[test]
    fn test_truncates_to_shorter() {
        let a = buf(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let b = buf(&[1.0, 2.0, 4.0]);
        let r = compare(&a, &b).unwrap();
        assert_eq!(r.truncated_length, 3);
        assert_eq!(r.original_lengths, (5, 3));
        assert!(r.was_truncated());
        assert_abs_diff_eq!(r.mse, 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r.mae, 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_all_zero_is_exactly_zero() {
        let z = buf(&[0.0; 8]);
        let r = compare(&z, &z).unwrap();
        assert_eq!(r.cosine_similarity, 0.0);
        assert_eq!(r.mse, 0.0);
        assert_eq!(r.mae, 0.0);

        let a = buf(&[1.0; 8]);
        let tiny = buf(&[1e-9; 8]);
        assert_eq!(compare(&a, &tiny).unwrap().cosine_similarity, 0.0);
    }

    #[test]
    fn test_opposite_vectors() {
        let a = buf(&[1.0, 2.0, 3.0]);
        let b = buf(&[-1.0, -2.0, -3.0]);
        let r = compare(&a, &b).unwrap();
        assert_abs_diff_eq!(r.cosine_similarity, -1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(r.mae, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_orthogonal() {
        let r = compare_slices(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert_abs_diff_eq!(r.cosine_similarity, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r.mse, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_comparison() {
        let err = compare_slices(&[], &[1.0]).unwrap_err();
        assert!(matches!(err, CompareError::EmptyComparison { left: 0, right: 1 }));
    }

    #[test]
    fn test_metric_length_mismatch() {
        let err = mean_squared_error(&[1.0, 2.0], &[1.0]).unwrap_err();
        match err {
            CompareError::MetricComputation { reason } => assert!(reason.contains("2 vs 1")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_overflow_is_metric_error() {
        let err = compare_slices(&[f64::MAX, -f64::MAX], &[-f64::MAX, f64::MAX]).unwrap_err();
        assert!(matches!(err, CompareError::MetricComputation { .. }));
    }

    #[test]
    fn test_summary_format() {
        let r = ComparisonResult {
            cosine_similarity: 0.99876,
            mse: 0.0012345,
            mae: 0.0000012345,
            truncated_length: 10,
            original_lengths: (10, 10),
        };
        assert_eq!(r.summary(), "Cos: 0.999, MSE: 0.0012, MAE: 0.000001");
    }
}
