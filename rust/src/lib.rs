//! # binlens
//!
//! Inspect, compare and concatenate flat headerless numeric dumps
//! (`.bin` files) read as int8, int16, float32 or float64.
//!
//! ```rust
//! use binlens::{compare, decode_bytes, ElementEncoding};
//!
//! let a: Vec<u8> = [1.0f32, 2.0, 3.0].iter().flat_map(|v| v.to_ne_bytes()).collect();
//! let b: Vec<u8> = [1.0f32, 2.0].iter().flat_map(|v| v.to_ne_bytes()).collect();
//!
//! let a = decode_bytes(&a, ElementEncoding::Float32).unwrap();
//! let b = decode_bytes(&b, ElementEncoding::Float32).unwrap();
//! let result = compare(&a, &b).unwrap();
//!
//! assert_eq!(result.truncated_length, 2);
//! assert_eq!(result.original_lengths, (3, 2));
//! assert_eq!(result.mse, 0.0);
//! ```
//!
//! Tensor concatenation:
//!
//! ```no_run
//! use binlens::{ConcatMode, ConcatenationJob, ElementEncoding, ShapeSpec};
//!
//! let mut job = ConcatenationJob::new(ElementEncoding::Float32);
//! job.add_files(["a.bin", "b.bin"]);
//! job.set_mode(ConcatMode::Tensor);
//! job.set_shape(0, ShapeSpec::parse("2,3,4")?)?;
//! job.set_shape(1, ShapeSpec::parse("5,3,4")?)?;
//! job.set_axis(0);
//! let shape = job.assemble()?.shape().to_vec();
//! assert_eq!(shape, vec![7, 3, 4]);
//! job.save("concatenated.bin")?;
//! # Ok::<(), binlens::Error>(())
//! ```

pub mod assembler;
pub mod config;
pub mod decoder;
pub mod display;
pub mod encoding;
pub mod error;
pub mod guard;
pub mod shape;
pub mod similarity;
pub mod tensor;

pub use assembler::{AssembleError, ConcatMode, ConcatenationJob, JobEntry, JobState, SaveReport, MAX_INPUTS};
pub use config::{ConfigError, Language, Settings, Theme};
pub use decoder::{decode, decode_bytes, read_elements, sanitize, DecodeError, NumericBuffer, RawElements};
pub use display::{downsample, format_cosine, format_metric, DataInfo};
pub use encoding::{ElementEncoding, EncodingError};
pub use error::{Error, ErrorKind, Result};
pub use guard::{FileGuard, GuardError};
pub use shape::{ShapeError, ShapeSpec, ShapeSyntax};
pub use similarity::{compare, compare_files, CompareError, ComparisonResult};
pub use tensor::{Tensor, TensorError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_tensor_dump() {
        let values = [1.5f32, -2.0, 0.25];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();

        let raw = RawElements::from_bytes(bytes.clone(), ElementEncoding::Float32).unwrap();
        let tensor = Tensor::from_raw(raw);
        assert_eq!(tensor.as_bytes(), bytes.as_slice());

        let decoded = decode_bytes(tensor.as_bytes(), ElementEncoding::Float32).unwrap();
        assert_eq!(decoded.values(), &[1.5, -2.0, 0.25]);
    }
}
