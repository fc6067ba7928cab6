//! Tensor assembler: reshape and concatenate up to four inputs
//!
//! A [`ConcatenationJob`] is edited interactively (files added, removed and
//! reordered, mode, axis and shapes changed) and re-validated after every
//! edit. Assembly produces one [`Tensor`] that stays available for saving
//! until the next edit.
//!
//! ```text
//! Empty -> Collecting -> Configuring -> Validated -> Assembled
//!            ^   |            ^             |           |
//!            +---+            +-------------+-----------+  (any edit)
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::decoder::{read_elements, DecodeError};
use crate::encoding::ElementEncoding;
use crate::shape::{ShapeError, ShapeSpec, ShapeSyntax};
use crate::tensor::{Tensor, TensorError};

/// Maximum number of inputs in one job
pub const MAX_INPUTS: usize = 4;

/// Error type for job edits, validation and assembly
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("cannot add {}: a job holds at most {capacity} files", .path.display())]
    CapacityExceeded { path: PathBuf, capacity: usize },

    #[error("{} is already part of the job", .path.display())]
    DuplicateFile { path: PathBuf },

    #[error("no file at position {index} (job has {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("add at least one file")]
    NoFiles,

    #[error("{file} needs a shape in tensor mode")]
    MissingShape { file: String },

    #[error("{file}: shape text rejected: {source}")]
    InvalidShape {
        file: String,
        #[source]
        source: ShapeError,
    },

    #[error("axis {axis} is out of range for {file} (rank {rank})")]
    AxisOutOfRange { axis: usize, rank: usize, file: String },

    #[error("{file}: size mismatch, expected {expected} elements but the file holds {actual}")]
    SizeMismatch {
        file: String,
        expected: usize,
        actual: usize,
        file_bytes: u64,
    },

    #[error(
        "cannot concatenate: dimension {dimension} differs ({first} has {expected}, {offending} has {found})"
    )]
    ShapeConcatenation {
        dimension: usize,
        expected: usize,
        found: usize,
        first: String,
        offending: String,
    },

    #[error("cannot inspect {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: io::Error,
    },

    #[error("nothing assembled yet")]
    NotAssembled,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Tensor(TensorError),
}

impl From<TensorError> for AssembleError {
    fn from(err: TensorError) -> Self {
        match err {
            TensorError::ShapeConcatenation { dimension, expected, found, first, offending } => {
                AssembleError::ShapeConcatenation { dimension, expected, found, first, offending }
            }
            other => AssembleError::Tensor(other),
        }
    }
}

/// How inputs are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcatMode {
    /// Every input flattened and appended end to end
    #[default]
    Simple,
    /// Every input reshaped to its declared shape, joined along an axis
    Tensor,
}

impl fmt::Display for ConcatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConcatMode::Simple => "simple",
            ConcatMode::Tensor => "tensor",
        })
    }
}

impl FromStr for ConcatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(ConcatMode::Simple),
            "tensor" => Ok(ConcatMode::Tensor),
            other => Err(format!("unknown concat mode {other:?} (expected simple or tensor)")),
        }
    }
}

/// Lifecycle position of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Empty,
    Collecting,
    Configuring,
    Validated,
    Assembled,
}

/// One input file and its declared shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEntry {
    path: PathBuf,
    shape: Option<ShapeSpec>,
}

impl JobEntry {
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn shape(&self) -> Option<&ShapeSpec> {
        self.shape.as_ref()
    }

    /// File name used in messages
    pub fn label(&self) -> String {
        file_label(&self.path)
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Outcome of writing an assembled tensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub path: PathBuf,
    pub shape: Vec<usize>,
    pub byte_len: usize,
    /// CRC32 of the written bytes, with the `checksum` feature
    pub checksum: Option<u32>,
}

/// Inputs, mode, axis and shapes of one concatenation
#[derive(Debug)]
pub struct ConcatenationJob {
    entries: Vec<JobEntry>,
    encoding: ElementEncoding,
    mode: ConcatMode,
    axis: usize,
    configured: bool,
    issue: Option<AssembleError>,
    result: Option<Tensor>,
}

impl ConcatenationJob {
    pub fn new(encoding: ElementEncoding) -> Self {
        Self {
            entries: Vec::new(),
            encoding,
            mode: ConcatMode::Simple,
            axis: 0,
            configured: false,
            issue: Some(AssembleError::NoFiles),
            result: None,
        }
    }

    /// Start in the given mode without counting it as a configuration edit
    pub fn with_mode(mut self, mode: ConcatMode, axis: usize) -> Self {
        self.mode = mode;
        self.axis = axis;
        self
    }

    #[inline]
    pub fn entries(&self) -> &[JobEntry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn encoding(&self) -> ElementEncoding {
        self.encoding
    }

    #[inline]
    pub fn mode(&self) -> ConcatMode {
        self.mode
    }

    #[inline]
    pub fn axis(&self) -> usize {
        self.axis
    }

    /// Free slots left
    #[inline]
    pub fn remaining_capacity(&self) -> usize {
        MAX_INPUTS - self.entries.len()
    }

    pub fn state(&self) -> JobState {
        if self.entries.is_empty() {
            JobState::Empty
        } else if self.result.is_some() {
            JobState::Assembled
        } else if self.issue.is_none() {
            JobState::Validated
        } else if self.configured {
            JobState::Configuring
        } else {
            JobState::Collecting
        }
    }

    /// Outcome of the validation run after the last edit
    pub fn status(&self) -> Result<(), &AssembleError> {
        match &self.issue {
            Some(issue) => Err(issue),
            None => Ok(()),
        }
    }

    /// Tensor from the last [`assemble`](Self::assemble), if nothing changed since
    #[inline]
    pub fn assembled(&self) -> Option<&Tensor> {
        self.result.as_ref()
    }

    pub fn add_file(&mut self, path: impl Into<PathBuf>) -> Result<(), AssembleError> {
        let path = path.into();
        if self.entries.iter().any(|e| e.path == path) {
            return Err(AssembleError::DuplicateFile { path });
        }
        if self.entries.len() >= MAX_INPUTS {
            return Err(AssembleError::CapacityExceeded { path, capacity: MAX_INPUTS });
        }
        debug!(path = %path.display(), "added file to job");
        self.entries.push(JobEntry { path, shape: None });
        self.edited();
        Ok(())
    }

    /// Add files in order until the job is full. Returns the rejected ones.
    pub fn add_files<I, P>(&mut self, paths: I) -> Vec<AssembleError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let rejected: Vec<AssembleError> = paths
            .into_iter()
            .filter_map(|p| self.add_file(p).err())
            .collect();
        if !rejected.is_empty() {
            warn!(rejected = rejected.len(), "some files were not added to the job");
        }
        rejected
    }

    pub fn remove_file(&mut self, index: usize) -> Result<JobEntry, AssembleError> {
        self.check_index(index)?;
        let entry = self.entries.remove(index);
        self.edited();
        Ok(entry)
    }

    /// Move the file at `from` so it ends up at position `to`.
    pub fn move_file(&mut self, from: usize, to: usize) -> Result<(), AssembleError> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from != to {
            let entry = self.entries.remove(from);
            self.entries.insert(to, entry);
            self.edited();
        }
        Ok(())
    }

    pub fn set_encoding(&mut self, encoding: ElementEncoding) {
        self.encoding = encoding;
        self.configure();
    }

    pub fn set_mode(&mut self, mode: ConcatMode) {
        self.mode = mode;
        self.configure();
    }

    pub fn set_axis(&mut self, axis: usize) {
        self.axis = axis;
        self.configure();
    }

    pub fn set_shape(&mut self, index: usize, shape: ShapeSpec) -> Result<(), AssembleError> {
        self.check_index(index)?;
        self.entries[index].shape = Some(shape);
        self.configure();
        Ok(())
    }

    /// Parse and set a shape. Text that does not parse clears the shape.
    pub fn set_shape_text(
        &mut self,
        index: usize,
        text: &str,
        syntax: ShapeSyntax,
    ) -> Result<&ShapeSpec, AssembleError> {
        self.check_index(index)?;
        let parsed = ShapeSpec::parse_with(text, syntax);
        let entry = &mut self.entries[index];
        entry.shape = parsed.as_ref().ok().cloned();
        let file = entry.label();
        self.configure();
        match parsed {
            Ok(_) => self.entries[index].shape.as_ref().ok_or(AssembleError::MissingShape { file }),
            Err(source) => Err(AssembleError::InvalidShape { file, source }),
        }
    }

    pub fn clear_shape(&mut self, index: usize) -> Result<(), AssembleError> {
        self.check_index(index)?;
        self.entries[index].shape = None;
        self.configure();
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<(), AssembleError> {
        if index < self.entries.len() {
            Ok(())
        } else {
            Err(AssembleError::IndexOutOfRange { index, len: self.entries.len() })
        }
    }

    fn configure(&mut self) {
        self.configured = true;
        self.edited();
    }

    fn edited(&mut self) {
        self.result = None;
        if self.entries.is_empty() {
            self.configured = false;
        }
        self.issue = self.validate().err();
    }

    /// Check every rule in file order; the first failure is returned.
    pub fn validate(&self) -> Result<(), AssembleError> {
        if self.entries.is_empty() {
            return Err(AssembleError::NoFiles);
        }
        if self.mode == ConcatMode::Simple {
            return Ok(());
        }

        let width = self.encoding.width();
        for entry in &self.entries {
            let file = entry.label();
            let shape = entry
                .shape
                .as_ref()
                .ok_or_else(|| AssembleError::MissingShape { file: file.clone() })?;
            if self.axis >= shape.rank() {
                return Err(AssembleError::AxisOutOfRange {
                    axis: self.axis,
                    rank: shape.rank(),
                    file,
                });
            }

            let file_bytes = fs::metadata(&entry.path)
                .map_err(|source| AssembleError::Io { file: file.clone(), source })?
                .len();
            let expected = shape.element_count();
            let expected_bytes = expected.and_then(|n| n.checked_mul(width));
            if expected_bytes.map(|b| b as u64) != Some(file_bytes) {
                return Err(AssembleError::SizeMismatch {
                    file,
                    expected: expected.unwrap_or(usize::MAX),
                    actual: (file_bytes / width as u64) as usize,
                    file_bytes,
                });
            }
        }
        Ok(())
    }

    /// Validate, read every input and build the output tensor.
    ///
    /// Element bytes are copied exactly; sanitization only applies to
    /// previews.
    pub fn assemble(&mut self) -> Result<&Tensor, AssembleError> {
        self.result = None;
        if let Err(e) = self.validate() {
            warn!(error = %e, "job is not ready to assemble");
            return Err(e);
        }

        let mut parts = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let mut tensor = Tensor::from_raw(read_elements(&entry.path, self.encoding)?);
            if self.mode == ConcatMode::Tensor {
                if let Some(shape) = &entry.shape {
                    tensor = tensor.reshape(shape.dims())?;
                }
            }
            parts.push((entry.label(), tensor));
        }

        let axis = match self.mode {
            ConcatMode::Simple => 0,
            ConcatMode::Tensor => self.axis,
        };
        let tensor = Tensor::concat(&parts, axis)?;
        debug!(
            mode = %self.mode,
            axis,
            inputs = parts.len(),
            shape = %tensor.shape_string(),
            bytes = tensor.byte_len(),
            "assembled tensor"
        );
        Ok(self.result.insert(tensor))
    }

    /// Write the assembled tensor as a flat headerless dump.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<SaveReport, AssembleError> {
        let tensor = self.result.as_ref().ok_or(AssembleError::NotAssembled)?;
        let path = path.as_ref();
        tensor.write_to(path)?;

        #[cfg(feature = "checksum")]
        let checksum = Some(tensor.checksum());
        #[cfg(not(feature = "checksum"))]
        let checksum = None;

        debug!(path = %path.display(), bytes = tensor.byte_len(), "saved assembled tensor");
        Ok(SaveReport {
            path: path.to_path_buf(),
            shape: tensor.shape().to_vec(),
            byte_len: tensor.byte_len(),
            checksum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_f32(dir: &TempDir, name: &str, values: impl IntoIterator<Item = f32>) -> PathBuf {
        let path = dir.path().join(name);
        let bytes: Vec<u8> = values.into_iter().flat_map(|v| v.to_ne_bytes()).collect();
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_state_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_f32(&dir, "a.bin", (0..24).map(|i| i as f32));
        let mut job = ConcatenationJob::new(ElementEncoding::Float32);
        assert_eq!(job.state(), JobState::Empty);

        job.add_file(&a).unwrap();
        // simple mode needs nothing else
        assert_eq!(job.state(), JobState::Validated);

        job.set_mode(ConcatMode::Tensor);
        assert_eq!(job.state(), JobState::Configuring);
        assert!(matches!(job.status(), Err(AssembleError::MissingShape { .. })));

        job.set_shape(0, ShapeSpec::new(vec![2, 3, 4]).unwrap()).unwrap();
        assert_eq!(job.state(), JobState::Validated);

        job.assemble().unwrap();
        assert_eq!(job.state(), JobState::Assembled);

        job.set_axis(1);
        assert_eq!(job.state(), JobState::Validated);
        assert!(job.assembled().is_none());

        job.remove_file(0).unwrap();
        assert_eq!(job.state(), JobState::Empty);
    }

    #[test]
    fn test_collecting_until_configured() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_f32(&dir, "a.bin", vec![0.0; 6]);
        let mut job = ConcatenationJob::new(ElementEncoding::Float32).with_mode(ConcatMode::Tensor, 0);
        job.add_file(&a).unwrap();
        assert_eq!(job.state(), JobState::Collecting);

        job.set_shape_text(0, "2x3", ShapeSyntax::Permissive).unwrap();
        assert_eq!(job.state(), JobState::Validated);

        job.set_shape_text(0, "4,4", ShapeSyntax::Permissive).unwrap();
        assert_eq!(job.state(), JobState::Configuring);
    }

    #[test]
    fn test_simple_mode_defers_disk_access() {
        let mut job = ConcatenationJob::new(ElementEncoding::Float32);
        job.add_file("/nonexistent/a.bin").unwrap();
        // simple mode validation does not touch the disk
        assert_eq!(job.state(), JobState::Validated);
        assert!(matches!(job.assemble(), Err(AssembleError::Decode(DecodeError::NotFound { .. }))));
    }

    #[test]
    fn test_capacity_and_duplicates() {
        let mut job = ConcatenationJob::new(ElementEncoding::Int8);
        let rejected = job.add_files(["a.bin", "b.bin", "a.bin", "c.bin", "d.bin", "e.bin"]);
        assert_eq!(job.len(), MAX_INPUTS);
        assert_eq!(rejected.len(), 2);
        assert!(matches!(rejected[0], AssembleError::DuplicateFile { .. }));
        assert!(matches!(rejected[1], AssembleError::CapacityExceeded { capacity: 4, .. }));
        assert_eq!(job.remaining_capacity(), 0);
    }

    #[test]
    fn test_move_keeps_shapes_with_files() {
        let mut job = ConcatenationJob::new(ElementEncoding::Int8);
        job.add_files(["a.bin", "b.bin", "c.bin"]);
        job.set_shape(0, ShapeSpec::new(vec![9]).unwrap()).unwrap();
        job.move_file(0, 2).unwrap();
        let labels: Vec<String> = job.entries().iter().map(|e| e.label()).collect();
        assert_eq!(labels, vec!["b.bin", "c.bin", "a.bin"]);
        assert_eq!(job.entries()[2].shape().unwrap().dims(), &[9]);
        assert!(matches!(job.move_file(0, 3), Err(AssembleError::IndexOutOfRange { index: 3, len: 3 })));
    }

    #[test]
    fn test_axis_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_f32(&dir, "a.bin", vec![0.0; 6]);
        let mut job = ConcatenationJob::new(ElementEncoding::Float32);
        job.add_file(&a).unwrap();
        job.set_mode(ConcatMode::Tensor);
        job.set_shape(0, ShapeSpec::new(vec![2, 3]).unwrap()).unwrap();
        job.set_axis(2);
        assert!(matches!(
            job.validate(),
            Err(AssembleError::AxisOutOfRange { axis: 2, rank: 2, .. })
        ));
    }

    #[test]
    fn test_size_mismatch_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_f32(&dir, "a.bin", vec![1.0; 25]);
        let mut job = ConcatenationJob::new(ElementEncoding::Float32);
        job.add_file(&a).unwrap();
        job.set_mode(ConcatMode::Tensor);
        job.set_shape_text(0, "3,3,3", ShapeSyntax::Permissive).unwrap();
        match job.validate() {
            Err(AssembleError::SizeMismatch { file, expected, actual, file_bytes }) => {
                assert_eq!(file, "a.bin");
                assert_eq!((expected, actual, file_bytes), (27, 25, 100));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_bad_shape_text_clears_shape() {
        let mut job = ConcatenationJob::new(ElementEncoding::Float32);
        job.add_file("a.bin").unwrap();
        job.set_shape(0, ShapeSpec::new(vec![4]).unwrap()).unwrap();
        let err = job.set_shape_text(0, "none", ShapeSyntax::Permissive).unwrap_err();
        assert!(matches!(err, AssembleError::InvalidShape { .. }));
        assert!(job.entries()[0].shape().is_none());
    }

    #[test]
    fn test_save_requires_assembly() {
        let job = ConcatenationJob::new(ElementEncoding::Float32);
        assert!(matches!(job.save("out.bin"), Err(AssembleError::NotAssembled)));
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("Tensor".parse::<ConcatMode>().unwrap(), ConcatMode::Tensor);
        assert!("stack".parse::<ConcatMode>().is_err());
    }
}
