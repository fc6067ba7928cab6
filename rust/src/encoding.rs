//! Element encodings understood by the decoder.
//!
//! A `.bin` file carries no header, so the encoding is always chosen by the
//! caller. Multi-byte elements use the native byte order of the host.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for encoding name parsing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("unknown element encoding: {name:?} (expected int8, int16, float32 or float64)")]
    UnknownEncoding { name: String },
}

/// Fixed-width numeric interpretation applied to raw bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementEncoding {
    Int8,
    Int16,
    Float32,
    Float64,
}

impl ElementEncoding {
    /// All supported encodings, narrowest first
    pub const ALL: [ElementEncoding; 4] = [
        ElementEncoding::Int8,
        ElementEncoding::Int16,
        ElementEncoding::Float32,
        ElementEncoding::Float64,
    ];

    /// Byte width of one element
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            ElementEncoding::Int8 => 1,
            ElementEncoding::Int16 => 2,
            ElementEncoding::Float32 => 4,
            ElementEncoding::Float64 => 8,
        }
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, ElementEncoding::Float32 | ElementEncoding::Float64)
    }

    /// Canonical lowercase name (`int8`, `int16`, `float32`, `float64`)
    pub const fn name(self) -> &'static str {
        match self {
            ElementEncoding::Int8 => "int8",
            ElementEncoding::Int16 => "int16",
            ElementEncoding::Float32 => "float32",
            ElementEncoding::Float64 => "float64",
        }
    }

    /// Reinterpret exactly `width()` bytes as one element, widened to f64.
    ///
    /// Every value of the four encodings is exactly representable in f64,
    /// so widening never loses information. Non-finite floats come back
    /// unchanged; sanitization is the decoder's job.
    ///
    /// # Panics
    ///
    /// Panics if `chunk.len() != self.width()`. Callers slice with
    /// `chunks_exact(width)`.
    #[inline(always)]
    pub fn decode_element(self, chunk: &[u8]) -> f64 {
        match self {
            ElementEncoding::Int8 => chunk[0] as i8 as f64,
            ElementEncoding::Int16 => i16::from_ne_bytes([chunk[0], chunk[1]]) as f64,
            ElementEncoding::Float32 => {
                f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64
            }
            ElementEncoding::Float64 => f64::from_ne_bytes([
                chunk[0], chunk[1], chunk[2], chunk[3],
                chunk[4], chunk[5], chunk[6], chunk[7],
            ]),
        }
    }
}

impl fmt::Display for ElementEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementEncoding {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int8" | "i8" => Ok(ElementEncoding::Int8),
            "int16" | "i16" => Ok(ElementEncoding::Int16),
            "float32" | "f32" => Ok(ElementEncoding::Float32),
            "float64" | "f64" => Ok(ElementEncoding::Float64),
            _ => Err(EncodingError::UnknownEncoding { name: s.to_string() }),
        }
    }
}
