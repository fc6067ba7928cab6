//! N-dimensional row-major tensors over raw element bytes
//!
//! A [`Tensor`] keeps the exact bytes of its elements rather than widened
//! values, so reshaping and concatenating never change a single bit and
//! the saved dump matches the inputs byte for byte.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::decoder::{sanitize, RawElements};
use crate::encoding::ElementEncoding;

/// Error type for tensor operations
#[derive(Debug, Error)]
pub enum TensorError {
    #[error("nothing to concatenate")]
    EmptyConcat,

    #[error("cannot reshape {actual} elements into {shape:?} ({expected} elements)")]
    ElementCountMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("axis {axis} is out of range for rank {rank}")]
    AxisOutOfRange { axis: usize, rank: usize },

    #[error("{offending} is {found}, expected {expected} like {first}")]
    EncodingMismatch {
        first: String,
        offending: String,
        expected: ElementEncoding,
        found: ElementEncoding,
    },

    #[error("{offending} has rank {found}, but {first} has rank {expected}")]
    RankMismatch {
        first: String,
        offending: String,
        expected: usize,
        found: usize,
    },

    #[error(
        "dimension {dimension} does not match: {first} has {expected}, {offending} has {found}"
    )]
    ShapeConcatenation {
        dimension: usize,
        expected: usize,
        found: usize,
        first: String,
        offending: String,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Row-major tensor of one element encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tensor {
    encoding: ElementEncoding,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl Tensor {
    /// Rank-1 tensor over all complete elements of an input
    pub fn from_raw(raw: RawElements) -> Self {
        let encoding = raw.encoding();
        let len = raw.len();
        Self { encoding, shape: vec![len], data: raw.into_bytes() }
    }

    /// Same elements under a new shape. The element count must not change.
    pub fn reshape(self, dims: &[usize]) -> Result<Self, TensorError> {
        let expected = dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d));
        let actual = self.len();
        match expected {
            Some(n) if n == actual => Ok(Self { shape: dims.to_vec(), ..self }),
            _ => Err(TensorError::ElementCountMismatch {
                shape: dims.to_vec(),
                expected: expected.unwrap_or(usize::MAX),
                actual,
            }),
        }
    }

    /// Concatenate labelled tensors along `axis`, in order.
    ///
    /// All parts need the same encoding and rank, and every dimension other
    /// than `axis` must match the first part exactly. Labels only appear in
    /// errors.
    pub fn concat(parts: &[(String, Tensor)], axis: usize) -> Result<Tensor, TensorError> {
        let (first_label, first) = parts.first().ok_or(TensorError::EmptyConcat)?;
        let rank = first.rank();
        if axis >= rank {
            return Err(TensorError::AxisOutOfRange { axis, rank });
        }

        let mut axis_total = 0usize;
        for (label, part) in parts {
            if part.encoding != first.encoding {
                return Err(TensorError::EncodingMismatch {
                    first: first_label.clone(),
                    offending: label.clone(),
                    expected: first.encoding,
                    found: part.encoding,
                });
            }
            if part.rank() != rank {
                return Err(TensorError::RankMismatch {
                    first: first_label.clone(),
                    offending: label.clone(),
                    expected: rank,
                    found: part.rank(),
                });
            }
            for (dimension, (&expected, &found)) in first.shape.iter().zip(&part.shape).enumerate() {
                if dimension != axis && expected != found {
                    return Err(TensorError::ShapeConcatenation {
                        dimension,
                        expected,
                        found,
                        first: first_label.clone(),
                        offending: label.clone(),
                    });
                }
            }
            axis_total += part.shape[axis];
        }

        // every part is `outer` blocks of `shape[axis..]` elements; the output
        // interleaves those blocks part by part
        let width = first.encoding.width();
        let outer: usize = first.shape[..axis].iter().product();
        let block_bytes: Vec<usize> = parts
            .iter()
            .map(|(_, t)| t.shape[axis..].iter().product::<usize>() * width)
            .collect();

        let total_bytes: usize = parts.iter().map(|(_, t)| t.data.len()).sum();
        let mut data = Vec::with_capacity(total_bytes);
        for o in 0..outer {
            for ((_, part), &block) in parts.iter().zip(&block_bytes) {
                data.extend_from_slice(&part.data[o * block..(o + 1) * block]);
            }
        }

        let mut shape = first.shape.clone();
        shape[axis] = axis_total;
        Ok(Tensor { encoding: first.encoding, shape, data })
    }

    #[inline]
    pub fn encoding(&self) -> ElementEncoding {
        self.encoding
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / self.encoding.width()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Flat row-major element bytes, the exact content of a saved dump
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Flattened values widened to f64 and sanitized, for previews
    pub fn values(&self) -> Vec<f64> {
        self.data
            .chunks_exact(self.encoding.width())
            .map(|chunk| sanitize(self.encoding.decode_element(chunk)))
            .collect()
    }

    /// `(7, 3, 4)`
    pub fn shape_string(&self) -> String {
        let dims: Vec<String> = self.shape.iter().map(|d| d.to_string()).collect();
        if dims.len() == 1 {
            format!("({},)", dims[0])
        } else {
            format!("({})", dims.join(", "))
        }
    }

    /// Write the flat headerless dump.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), TensorError> {
        let path = path.as_ref();
        fs::write(path, &self.data).map_err(|source| TensorError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// CRC32 of the dump
    #[cfg(feature = "checksum")]
    pub fn checksum(&self) -> u32 {
        crc32fast::hash(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_tensor(values: impl IntoIterator<Item = f32>) -> Tensor {
        let bytes: Vec<u8> = values.into_iter().flat_map(|v| v.to_ne_bytes()).collect();
        Tensor::from_raw(RawElements::from_bytes(bytes, ElementEncoding::Float32).unwrap())
    }

    fn labelled(parts: Vec<Tensor>) -> Vec<(String, Tensor)> {
        parts.into_iter().enumerate().map(|(i, t)| (format!("t{i}.bin"), t)).collect()
    }

    #[test]
    fn test_reshape() {
        let t = f32_tensor((0..24).map(|i| i as f32)).reshape(&[2, 3, 4]).unwrap();
        assert_eq!(t.shape(), &[2, 3, 4]);
        assert_eq!(t.rank(), 3);

        let err = t.reshape(&[5, 5]).unwrap_err();
        assert!(matches!(
            err,
            TensorError::ElementCountMismatch { expected: 25, actual: 24, .. }
        ));
    }

    #[test]
    fn test_concat_axis0_appends() {
        let a = f32_tensor([1.0, 2.0]);
        let b = f32_tensor([3.0]);
        let out = Tensor::concat(&labelled(vec![a, b]), 0).unwrap();
        assert_eq!(out.shape(), &[3]);
        assert_eq!(out.values(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_concat_axis1_interleaves_rows() {
        // [[0,1],[2,3]] ++ [[10],[11]] along axis 1 -> [[0,1,10],[2,3,11]]
        let a = f32_tensor([0.0, 1.0, 2.0, 3.0]).reshape(&[2, 2]).unwrap();
        let b = f32_tensor([10.0, 11.0]).reshape(&[2, 1]).unwrap();
        let out = Tensor::concat(&labelled(vec![a, b]), 1).unwrap();
        assert_eq!(out.shape(), &[2, 3]);
        assert_eq!(out.values(), vec![0.0, 1.0, 10.0, 2.0, 3.0, 11.0]);
    }

    #[test]
    fn test_concat_reports_conflicting_dimension() {
        let a = f32_tensor(vec![0.0; 24]).reshape(&[2, 3, 4]).unwrap();
        let b = f32_tensor(vec![0.0; 60]).reshape(&[5, 3, 4]).unwrap();
        let err = Tensor::concat(&labelled(vec![a, b]), 1).unwrap_err();
        match err {
            TensorError::ShapeConcatenation { dimension, expected, found, first, offending } => {
                assert_eq!((dimension, expected, found), (0, 2, 5));
                assert_eq!(first, "t0.bin");
                assert_eq!(offending, "t1.bin");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_concat_rank_and_axis_checks() {
        let a = f32_tensor([0.0; 4]).reshape(&[2, 2]).unwrap();
        let b = f32_tensor([0.0; 4]);
        assert!(matches!(
            Tensor::concat(&labelled(vec![a.clone(), b]), 0),
            Err(TensorError::RankMismatch { expected: 2, found: 1, .. })
        ));
        assert!(matches!(
            Tensor::concat(&labelled(vec![a]), 2),
            Err(TensorError::AxisOutOfRange { axis: 2, rank: 2 })
        ));
        assert!(matches!(Tensor::concat(&[], 0), Err(TensorError::EmptyConcat)));
    }

    #[test]
    fn test_values_sanitize_but_bytes_do_not() {
        let t = f32_tensor([f32::NAN, 2.0]);
        assert_eq!(t.values(), vec![0.0, 2.0]);
        assert!(f32::from_ne_bytes(t.as_bytes()[..4].try_into().unwrap()).is_nan());
    }

    #[test]
    fn test_shape_string() {
        assert_eq!(f32_tensor([1.0, 2.0]).shape_string(), "(2,)");
        let t = f32_tensor([0.0; 6]).reshape(&[2, 3]).unwrap();
        assert_eq!(t.shape_string(), "(2, 3)");
    }
}
