//! Raw buffer decoder - flat headerless dumps into typed numeric sequences
//!
//! The on-disk format is "whatever the bytes decode to": no length prefix,
//! no header, native byte order. All complete elements are used and a
//! trailing partial element is dropped without error.
//!
//! Decoding happens in two stages:
//!
//! 1. [`read_elements`] checks the path, reads the whole file and trims it
//!    to whole elements ([`RawElements`]). The tensor assembler stops here
//!    because it must reproduce the exact element bytes.
//! 2. [`RawElements::decode`] widens every element to f64 and replaces
//!    NaN, +Inf and -Inf with 0.0 ([`NumericBuffer`]).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::encoding::ElementEncoding;

/// Buffers at or above this many elements are decoded on the rayon pool
/// when the `parallel` feature is enabled.
pub const PARALLEL_THRESHOLD: usize = 1_000_000;

/// Label used in errors for buffers that did not come from a file
const MEMORY_LABEL: &str = "<memory>";

/// Error type for decoding
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("file does not exist: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("path is not a file: {}", .path.display())]
    NotAFile { path: PathBuf },

    #[error("{label} decodes to zero {encoding} elements ({byte_len} bytes)")]
    EmptyData {
        label: String,
        encoding: ElementEncoding,
        byte_len: usize,
    },

    #[error("failed to read {}: {source}", .path.display())]
    IoFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Whole-element bytes of one input, not yet interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawElements {
    encoding: ElementEncoding,
    bytes: Vec<u8>,
    trailing_bytes: usize,
}

impl RawElements {
    /// Trim `bytes` to whole elements of `encoding`.
    pub fn from_bytes(mut bytes: Vec<u8>, encoding: ElementEncoding) -> Result<Self, DecodeError> {
        let trailing_bytes = Self::trim(&mut bytes, encoding, MEMORY_LABEL)?;
        Ok(Self { encoding, bytes, trailing_bytes })
    }

    fn trim(bytes: &mut Vec<u8>, encoding: ElementEncoding, label: &str) -> Result<usize, DecodeError> {
        let width = encoding.width();
        let count = bytes.len() / width;
        if count == 0 {
            return Err(DecodeError::EmptyData {
                label: label.to_string(),
                encoding,
                byte_len: bytes.len(),
            });
        }
        let trailing = bytes.len() - count * width;
        bytes.truncate(count * width);
        Ok(trailing)
    }

    #[inline]
    pub fn encoding(&self) -> ElementEncoding {
        self.encoding
    }

    /// Number of complete elements
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len() / self.encoding.width()
    }

    /// Always false: construction rejects inputs without a complete element
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Element bytes, trailing partial element already removed
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Bytes dropped from the end because they did not form a whole element
    #[inline]
    pub fn trailing_bytes(&self) -> usize {
        self.trailing_bytes
    }

    /// Size of the original input in bytes
    #[inline]
    pub fn source_bytes(&self) -> usize {
        self.bytes.len() + self.trailing_bytes
    }

    /// Widen to f64 and sanitize non-finite values.
    pub fn decode(&self) -> NumericBuffer {
        let (values, sanitized) = decode_values(&self.bytes, self.encoding);
        NumericBuffer {
            encoding: self.encoding,
            values,
            source_bytes: self.source_bytes(),
            trailing_bytes: self.trailing_bytes,
            sanitized,
        }
    }
}

/// Decoded, sanitized samples of one input under one encoding.
///
/// Every value is finite. Integer encodings and float32 widen to f64
/// exactly, so the stored values equal the file's values except where
/// sanitization replaced a NaN or infinity.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericBuffer {
    encoding: ElementEncoding,
    values: Vec<f64>,
    source_bytes: usize,
    trailing_bytes: usize,
    sanitized: usize,
}

impl NumericBuffer {
    /// Build a buffer from already-decoded samples, sanitizing them.
    pub fn from_values(encoding: ElementEncoding, mut values: Vec<f64>) -> Self {
        let sanitized = sanitize_in_place(&mut values);
        let source_bytes = values.len() * encoding.width();
        Self { encoding, values, source_bytes, trailing_bytes: 0, sanitized }
    }

    #[inline]
    pub fn encoding(&self) -> ElementEncoding {
        self.encoding
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Size of the decoded input in bytes, including dropped trailing bytes
    #[inline]
    pub fn source_bytes(&self) -> usize {
        self.source_bytes
    }

    #[inline]
    pub fn trailing_bytes(&self) -> usize {
        self.trailing_bytes
    }

    /// How many NaN/Inf values were replaced by 0.0
    #[inline]
    pub fn sanitized_count(&self) -> usize {
        self.sanitized
    }
}

/// Replace NaN, +Inf and -Inf with 0.0; every other value passes through.
#[inline(always)]
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn sanitize_in_place(values: &mut [f64]) -> usize {
    let mut replaced = 0;
    for v in values.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
            replaced += 1;
        }
    }
    replaced
}

fn decode_values(bytes: &[u8], encoding: ElementEncoding) -> (Vec<f64>, usize) {
    let width = encoding.width();
    let count = bytes.len() / width;

    #[cfg(feature = "parallel")]
    {
        if count >= PARALLEL_THRESHOLD {
            use rayon::prelude::*;

            let mut values: Vec<f64> = bytes
                .par_chunks_exact(width)
                .map(|chunk| encoding.decode_element(chunk))
                .collect();
            let replaced = if encoding.is_float() {
                values
                    .par_iter_mut()
                    .map(|v| {
                        if v.is_finite() {
                            0usize
                        } else {
                            *v = 0.0;
                            1
                        }
                    })
                    .sum()
            } else {
                0
            };
            return (values, replaced);
        }
    }

    let mut values = Vec::with_capacity(count);
    values.extend(bytes.chunks_exact(width).map(|chunk| encoding.decode_element(chunk)));
    let replaced = if encoding.is_float() { sanitize_in_place(&mut values) } else { 0 };
    (values, replaced)
}

/// Check the path and read it as whole elements of `encoding`.
///
/// Fails with `NotFound`, `NotAFile`, `EmptyData` or `IoFailure`.
pub fn read_elements(path: impl AsRef<Path>, encoding: ElementEncoding) -> Result<RawElements, DecodeError> {
    let path = path.as_ref();
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(DecodeError::NotFound { path: path.to_path_buf() });
        }
        Err(source) => {
            return Err(DecodeError::IoFailure { path: path.to_path_buf(), source });
        }
    };
    if !metadata.is_file() {
        return Err(DecodeError::NotAFile { path: path.to_path_buf() });
    }

    let mut bytes = fs::read(path).map_err(|source| DecodeError::IoFailure {
        path: path.to_path_buf(),
        source,
    })?;
    let label = path.display().to_string();
    let trailing_bytes = RawElements::trim(&mut bytes, encoding, &label)?;
    if trailing_bytes > 0 {
        debug!(path = %path.display(), %encoding, trailing_bytes, "dropped trailing partial element");
    }
    Ok(RawElements { encoding, bytes, trailing_bytes })
}

/// Decode a `.bin` file into a sanitized [`NumericBuffer`].
///
/// # Preconditions
///
/// The whole file is loaded into memory. Callers are expected to run the
/// size guard ([`crate::guard::FileGuard`], 50 MiB by default) first; the
/// decoder itself does not enforce a limit.
pub fn decode(path: impl AsRef<Path>, encoding: ElementEncoding) -> Result<NumericBuffer, DecodeError> {
    let path = path.as_ref();
    let buffer = read_elements(path, encoding)?.decode();
    if buffer.sanitized_count() > 0 {
        warn!(
            path = %path.display(),
            %encoding,
            replaced = buffer.sanitized_count(),
            "replaced non-finite values with 0.0"
        );
    }
    debug!(path = %path.display(), %encoding, elements = buffer.len(), "decoded bin file");
    Ok(buffer)
}

/// Same policy as [`decode`] for an in-memory buffer.
pub fn decode_bytes(bytes: &[u8], encoding: ElementEncoding) -> Result<NumericBuffer, DecodeError> {
    RawElements::from_bytes(bytes.to_vec(), encoding).map(|raw| raw.decode())
}
