//! Presentation helpers: metric formatting and display-only downsampling
//!
//! Nothing here feeds back into the numeric core. Downsampled data must
//! only ever be rendered, never compared.

use std::borrow::Cow;
use std::path::PathBuf;

use serde::Serialize;

use crate::decoder::NumericBuffer;
use crate::encoding::ElementEncoding;

/// Tensor previews longer than this are sampled down
pub const PREVIEW_SAMPLE_ABOVE: usize = 3_000;

/// Approximate point count of a sampled tensor preview
pub const PREVIEW_TARGET_POINTS: usize = 2_000;

/// Format an error metric: 4 decimals from 1e-3 up, 6 decimals in
/// [1e-6, 1e-3), 8 decimals below.
pub fn format_metric(value: f64) -> String {
    if value >= 1e-3 {
        format!("{value:.4}")
    } else if value >= 1e-6 {
        format!("{value:.6}")
    } else {
        format!("{value:.8}")
    }
}

/// Cosine similarity always uses 3 decimals
pub fn format_cosine(value: f64) -> String {
    format!("{value:.3}")
}

/// Stride sampling for rendering.
///
/// With `step = ceil(len / max_points)` keeps indices `0, step, 2*step, ...`.
/// Returns the input untouched when it already fits or `max_points` is 0.
pub fn downsample(values: &[f64], max_points: usize) -> Cow<'_, [f64]> {
    if max_points == 0 || values.len() <= max_points {
        return Cow::Borrowed(values);
    }
    let step = values.len().div_ceil(max_points);
    Cow::Owned(values.iter().step_by(step).copied().collect())
}

/// Sampling stride used for flattened tensor previews
pub fn preview_stride(len: usize) -> usize {
    if len > PREVIEW_SAMPLE_ABOVE {
        (len / PREVIEW_TARGET_POINTS).max(1)
    } else {
        1
    }
}

/// Whether a view showing `visible_len` samples is zoomed in enough to
/// mark individual points
#[inline]
pub fn should_show_points(visible_len: usize, threshold: usize) -> bool {
    visible_len <= threshold
}

/// Summary of a loaded buffer as shown next to its plot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataInfo {
    pub raw_length: usize,
    pub processed_length: usize,
    pub encoding: ElementEncoding,
    pub file_path: Option<PathBuf>,
}

impl DataInfo {
    pub fn new(buffer: &NumericBuffer, max_points: usize, file_path: Option<PathBuf>) -> Self {
        let processed_length = if max_points == 0 || buffer.len() <= max_points {
            buffer.len()
        } else {
            buffer.len().div_ceil(buffer.len().div_ceil(max_points))
        };
        Self {
            raw_length: buffer.len(),
            processed_length,
            encoding: buffer.encoding(),
            file_path,
        }
    }
}

/// Min, max and mean of a non-empty buffer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl ValueStats {
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &v in values {
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        Some(Self { min, max, mean: sum / values.len() as f64 })
    }
}
