//! Pre-decode file checks
//!
//! Decoding loads a whole file into memory, so every file goes through
//! [`FileGuard`] before it reaches the decoder.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Default upper bound on input size, in MiB
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 50;

const MIB: u64 = 1024 * 1024;

/// Error type for file validation
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("file path is empty")]
    EmptyPath,

    #[error("not a .bin file: {}", .path.display())]
    NotBinFile { path: PathBuf },

    #[error("file does not exist: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("file is {:.2}MB, exceeds the {}MB limit", as_mb(.size), .limit / MIB)]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("cannot inspect {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl GuardError {
    /// Human-readable rejection reason
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Size and extension checks for input files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileGuard {
    max_file_size_bytes: u64,
}

impl Default for FileGuard {
    fn default() -> Self {
        Self::with_limit_mb(DEFAULT_MAX_FILE_SIZE_MB)
    }
}

impl FileGuard {
    pub fn new(max_file_size_bytes: u64) -> Self {
        Self { max_file_size_bytes }
    }

    pub fn with_limit_mb(mb: u64) -> Self {
        Self::new(mb.saturating_mul(MIB))
    }

    #[inline]
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_bytes
    }

    /// Reject missing files and files above the limit. Returns the size.
    pub fn check_size(&self, path: impl AsRef<Path>) -> Result<u64, GuardError> {
        let path = path.as_ref();
        let size = match fs::metadata(path) {
            Ok(m) => m.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(GuardError::NotFound { path: path.to_path_buf() });
            }
            Err(source) => return Err(GuardError::Io { path: path.to_path_buf(), source }),
        };
        if size > self.max_file_size_bytes {
            return Err(GuardError::TooLarge {
                path: path.to_path_buf(),
                size,
                limit: self.max_file_size_bytes,
            });
        }
        Ok(size)
    }

    /// Non-empty path, `.bin` extension (any case), then [`check_size`](Self::check_size).
    pub fn check_bin_file(&self, path: impl AsRef<Path>) -> Result<u64, GuardError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(GuardError::EmptyPath);
        }
        if !has_bin_extension(path) {
            return Err(GuardError::NotBinFile { path: path.to_path_buf() });
        }
        self.check_size(path)
    }

    /// Split a batch of dropped or selected paths.
    ///
    /// Paths without a `.bin` extension are skipped silently; `.bin` files
    /// that fail the size check are returned with their error.
    pub fn partition<I, P>(&self, paths: I) -> (Vec<PathBuf>, Vec<(PathBuf, GuardError)>)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for path in paths.into_iter().map(Into::into) {
            if !has_bin_extension(&path) {
                debug!(path = %path.display(), "skipping non-.bin path");
                continue;
            }
            match self.check_size(&path) {
                Ok(_) => accepted.push(path),
                Err(e) => rejected.push((path, e)),
            }
        }
        (accepted, rejected)
    }
}

fn as_mb(bytes: &u64) -> f64 {
    *bytes as f64 / MIB as f64
}

/// Case-insensitive `.bin` extension test
pub fn has_bin_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("bin"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_extension() {
        assert!(has_bin_extension(Path::new("a/b/data.bin")));
        assert!(has_bin_extension(Path::new("DATA.BIN")));
        assert!(!has_bin_extension(Path::new("data.bin.txt")));
        assert!(!has_bin_extension(Path::new("bin")));
    }

    #[test]
    fn test_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.bin");
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(&[0u8; 2048]).unwrap();
        drop(f);

        assert_eq!(FileGuard::new(2048).check_bin_file(&path).unwrap(), 2048);
        let err = FileGuard::new(2047).check_bin_file(&path).unwrap_err();
        assert!(matches!(err, GuardError::TooLarge { size: 2048, limit: 2047, .. }));
    }

    #[test]
    fn test_too_large_reason() {
        let err = GuardError::TooLarge {
            path: PathBuf::from("big.bin"),
            size: 75_927_306,
            limit: 50 * MIB,
        };
        assert_eq!(err.reason(), "file is 72.41MB, exceeds the 50MB limit");
    }

    #[test]
    fn test_missing_and_wrong_extension() {
        let guard = FileGuard::default();
        assert!(matches!(guard.check_bin_file(""), Err(GuardError::EmptyPath)));
        assert!(matches!(guard.check_bin_file("nope.txt"), Err(GuardError::NotBinFile { .. })));
        assert!(matches!(
            guard.check_bin_file("/definitely/not/here.bin"),
            Err(GuardError::NotFound { .. })
        ));
    }

    #[test]
    fn test_partition() {
        let dir = tempfile::tempdir().unwrap();
        let small = dir.path().join("small.bin");
        let big = dir.path().join("big.bin");
        fs::write(&small, [0u8; 4]).unwrap();
        fs::write(&big, [0u8; 64]).unwrap();
        let other = dir.path().join("notes.txt");
        fs::write(&other, b"hi").unwrap();

        let (accepted, rejected) = FileGuard::new(16).partition([&small, &big, &other]);
        assert_eq!(accepted, vec![small]);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].0, big);
    }
}
