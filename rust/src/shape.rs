//! Declared tensor shapes and their text syntax
//!
//! The permissive syntax takes every run of digits as a dimension and
//! ignores everything else, so `3,224,224`, `3x224x224` and `(3 224 224)`
//! all parse the same. The strict syntax only accepts comma-separated
//! integers, optionally wrapped in `()` or `[]`.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static DIGIT_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("static regex"));

/// Error type for shape parsing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("shape text is empty")]
    Empty,

    #[error("no dimensions found in {text:?}")]
    NoDimensions { text: String },

    #[error("dimension {index} is zero")]
    ZeroDimension { index: usize },

    #[error("dimension {token:?} is too large")]
    Overflow { token: String },

    #[error("malformed dimension {token:?} (expected comma-separated integers)")]
    Malformed { token: String },
}

/// Which parser to apply to user-entered shape text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeSyntax {
    #[default]
    Permissive,
    Strict,
}

/// Non-empty list of positive dimensions, outermost first
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct ShapeSpec(Vec<usize>);

impl ShapeSpec {
    /// Build from explicit dimensions.
    pub fn new(dims: Vec<usize>) -> Result<Self, ShapeError> {
        if dims.is_empty() {
            return Err(ShapeError::Empty);
        }
        if let Some(index) = dims.iter().position(|&d| d == 0) {
            return Err(ShapeError::ZeroDimension { index });
        }
        Ok(Self(dims))
    }

    /// Parse with the given syntax.
    pub fn parse_with(text: &str, syntax: ShapeSyntax) -> Result<Self, ShapeError> {
        match syntax {
            ShapeSyntax::Permissive => Self::parse(text),
            ShapeSyntax::Strict => Self::parse_strict(text),
        }
    }

    /// Extract every embedded integer, in order, as a dimension.
    pub fn parse(text: &str) -> Result<Self, ShapeError> {
        if text.trim().is_empty() {
            return Err(ShapeError::Empty);
        }
        let dims = DIGIT_RUNS
            .find_iter(text)
            .map(|m| parse_dim(m.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        if dims.is_empty() {
            return Err(ShapeError::NoDimensions { text: text.to_string() });
        }
        Self::new(dims)
    }

    /// Comma-separated integers with optional whitespace and brackets.
    pub fn parse_strict(text: &str) -> Result<Self, ShapeError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ShapeError::Empty);
        }
        let inner = strip_brackets(trimmed).trim_end();
        // one trailing comma is allowed, as in `(3,)`
        let inner = inner.strip_suffix(',').unwrap_or(inner);
        let dims = inner
            .split(',')
            .map(str::trim)
            .map(|tok| {
                if tok.is_empty() || !tok.bytes().all(|b| b.is_ascii_digit()) {
                    Err(ShapeError::Malformed { token: tok.to_string() })
                } else {
                    parse_dim(tok)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(dims)
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of dimensions
    #[inline]
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Product of the dimensions, `None` on overflow
    pub fn element_count(&self) -> Option<usize> {
        self.0.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// `2,3,4` - the form stored next to a file entry
    pub fn to_csv(&self) -> String {
        self.0.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(",")
    }
}

impl fmt::Display for ShapeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{d}")?;
        }
        f.write_str(")")
    }
}

impl TryFrom<Vec<usize>> for ShapeSpec {
    type Error = ShapeError;

    fn try_from(dims: Vec<usize>) -> Result<Self, Self::Error> {
        Self::new(dims)
    }
}

impl From<ShapeSpec> for Vec<usize> {
    fn from(shape: ShapeSpec) -> Self {
        shape.0
    }
}

fn parse_dim(token: &str) -> Result<usize, ShapeError> {
    token
        .parse::<usize>()
        .map_err(|_| ShapeError::Overflow { token: token.to_string() })
}

fn strip_brackets(text: &str) -> &str {
    for (open, close) in [('(', ')'), ('[', ']')] {
        if let Some(inner) = text.strip_prefix(open).and_then(|t| t.strip_suffix(close)) {
            return inner;
        }
    }
    text
}
