//! Crate-level error and its kind taxonomy

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::assembler::AssembleError;
use crate::config::ConfigError;
use crate::decoder::DecodeError;
use crate::encoding::EncodingError;
use crate::guard::GuardError;
use crate::shape::ShapeError;
use crate::similarity::CompareError;
use crate::tensor::TensorError;

/// Any failure raised by this crate
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Compare(#[from] CompareError),

    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error(transparent)]
    Tensor(#[from] TensorError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Stable name for each distinct failure, for mapping to user messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    NotFound,
    NotAFile,
    EmptyData,
    IoFailure,
    EmptyComparison,
    MetricComputation,
    CapacityExceeded,
    DuplicateFile,
    IndexOutOfRange,
    NoFiles,
    MissingShape,
    InvalidShape,
    AxisOutOfRange,
    SizeMismatch,
    ShapeConcatenation,
    NotAssembled,
    FileRejected,
    UnknownEncoding,
    Config,
}

impl ErrorKind {
    /// Taxonomy name, e.g. `SizeMismatchError`
    pub const fn name(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::NotAFile => "NotAFileError",
            ErrorKind::EmptyData => "EmptyDataError",
            ErrorKind::IoFailure => "IOFailureError",
            ErrorKind::EmptyComparison => "EmptyComparisonError",
            ErrorKind::MetricComputation => "MetricComputationError",
            ErrorKind::CapacityExceeded => "CapacityExceededError",
            ErrorKind::DuplicateFile => "DuplicateFileError",
            ErrorKind::IndexOutOfRange => "IndexOutOfRangeError",
            ErrorKind::NoFiles => "NoFilesError",
            ErrorKind::MissingShape => "MissingShapeError",
            ErrorKind::InvalidShape => "InvalidShapeError",
            ErrorKind::AxisOutOfRange => "AxisOutOfRangeError",
            ErrorKind::SizeMismatch => "SizeMismatchError",
            ErrorKind::ShapeConcatenation => "ShapeConcatenationError",
            ErrorKind::NotAssembled => "NotAssembledError",
            ErrorKind::FileRejected => "FileRejectedError",
            ErrorKind::UnknownEncoding => "UnknownEncodingError",
            ErrorKind::Config => "ConfigError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&DecodeError> for ErrorKind {
    fn from(e: &DecodeError) -> Self {
        match e {
            DecodeError::NotFound { .. } => ErrorKind::NotFound,
            DecodeError::NotAFile { .. } => ErrorKind::NotAFile,
            DecodeError::EmptyData { .. } => ErrorKind::EmptyData,
            DecodeError::IoFailure { .. } => ErrorKind::IoFailure,
        }
    }
}

impl From<&TensorError> for ErrorKind {
    fn from(e: &TensorError) -> Self {
        match e {
            TensorError::ShapeConcatenation { .. }
            | TensorError::RankMismatch { .. }
            | TensorError::EncodingMismatch { .. }
            | TensorError::EmptyConcat => ErrorKind::ShapeConcatenation,
            TensorError::ElementCountMismatch { .. } => ErrorKind::SizeMismatch,
            TensorError::AxisOutOfRange { .. } => ErrorKind::AxisOutOfRange,
            TensorError::Io { .. } => ErrorKind::IoFailure,
        }
    }
}

impl From<&AssembleError> for ErrorKind {
    fn from(e: &AssembleError) -> Self {
        match e {
            AssembleError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            AssembleError::DuplicateFile { .. } => ErrorKind::DuplicateFile,
            AssembleError::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            AssembleError::NoFiles => ErrorKind::NoFiles,
            AssembleError::MissingShape { .. } => ErrorKind::MissingShape,
            AssembleError::InvalidShape { .. } => ErrorKind::InvalidShape,
            AssembleError::AxisOutOfRange { .. } => ErrorKind::AxisOutOfRange,
            AssembleError::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            AssembleError::ShapeConcatenation { .. } => ErrorKind::ShapeConcatenation,
            AssembleError::Io { .. } => ErrorKind::IoFailure,
            AssembleError::NotAssembled => ErrorKind::NotAssembled,
            AssembleError::Decode(d) => d.into(),
            AssembleError::Tensor(t) => t.into(),
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Decode(e) => e.into(),
            Error::Compare(CompareError::EmptyComparison { .. }) => ErrorKind::EmptyComparison,
            Error::Compare(CompareError::MetricComputation { .. }) => ErrorKind::MetricComputation,
            Error::Compare(CompareError::Decode(e)) => e.into(),
            Error::Assemble(e) => e.into(),
            Error::Tensor(e) => e.into(),
            Error::Shape(_) => ErrorKind::InvalidShape,
            Error::Guard(_) => ErrorKind::FileRejected,
            Error::Encoding(_) => ErrorKind::UnknownEncoding,
            Error::Config(_) => ErrorKind::Config,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_kinds_are_distinct_per_failure() {
        let not_found: Error = DecodeError::NotFound { path: PathBuf::from("x.bin") }.into();
        assert_eq!(not_found.kind(), ErrorKind::NotFound);

        let nested: Error =
            AssembleError::Decode(DecodeError::NotAFile { path: PathBuf::from("dir") }).into();
        assert_eq!(nested.kind(), ErrorKind::NotAFile);

        let mismatch: Error = AssembleError::SizeMismatch {
            file: "a.bin".into(),
            expected: 27,
            actual: 25,
            file_bytes: 100,
        }
        .into();
        assert_eq!(mismatch.kind(), ErrorKind::SizeMismatch);
        assert_eq!(mismatch.kind().to_string(), "SizeMismatchError");
        assert_eq!(
            mismatch.to_string(),
            "a.bin: size mismatch, expected 27 elements but the file holds 25"
        );

        let empty: Error = CompareError::EmptyComparison { left: 0, right: 3 }.into();
        assert_eq!(empty.kind(), ErrorKind::EmptyComparison);
    }
}
