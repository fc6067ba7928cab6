//! Property tests for decoding and comparison

use binlens::{compare, decode_bytes, ElementEncoding};
use proptest::prelude::*;

fn encoding() -> impl Strategy<Value = ElementEncoding> {
    prop::sample::select(ElementEncoding::ALL.to_vec())
}

/// Encodings whose squared values cannot overflow f64
fn bounded_encoding() -> impl Strategy<Value = ElementEncoding> {
    prop::sample::select(vec![ElementEncoding::Int8, ElementEncoding::Int16, ElementEncoding::Float32])
}

proptest! {
    #[test]
    fn decoded_length_is_whole_elements(bytes in prop::collection::vec(any::<u8>(), 0..512), enc in encoding()) {
        let width = enc.width();
        match decode_bytes(&bytes, enc) {
            Ok(buffer) => {
                prop_assert_eq!(buffer.len(), bytes.len() / width);
                prop_assert_eq!(buffer.trailing_bytes(), bytes.len() % width);
            }
            Err(_) => prop_assert!(bytes.len() < width),
        }
    }

    #[test]
    fn decoded_values_are_finite(bytes in prop::collection::vec(any::<u8>(), 8..512), enc in encoding()) {
        let buffer = decode_bytes(&bytes, enc).unwrap();
        prop_assert!(buffer.values().iter().all(|v| v.is_finite()));
        if !enc.is_float() {
            prop_assert_eq!(buffer.sanitized_count(), 0);
        }
    }

    #[test]
    fn self_comparison_is_exact(bytes in prop::collection::vec(any::<u8>(), 8..512), enc in bounded_encoding()) {
        let buffer = decode_bytes(&bytes, enc).unwrap();
        let r = compare(&buffer, &buffer).unwrap();
        prop_assert_eq!(r.mse, 0.0);
        prop_assert_eq!(r.mae, 0.0);
        prop_assert_eq!(r.truncated_length, buffer.len());
        let all_zero = buffer.values().iter().all(|v| v.abs() <= 1e-8);
        if all_zero {
            prop_assert_eq!(r.cosine_similarity, 0.0);
        } else {
            prop_assert!(r.cosine_similarity <= 1.0 + 1e-9);
            prop_assert!(r.cosine_similarity >= -1.0 - 1e-9);
        }
    }

    #[test]
    fn comparison_is_symmetric(
        a in prop::collection::vec(-1e3f64..1e3, 1..64),
        b in prop::collection::vec(-1e3f64..1e3, 1..64),
    ) {
        let to_bytes = |v: &[f64]| v.iter().flat_map(|x| x.to_ne_bytes()).collect::<Vec<u8>>();
        let a = decode_bytes(&to_bytes(&a), ElementEncoding::Float64).unwrap();
        let b = decode_bytes(&to_bytes(&b), ElementEncoding::Float64).unwrap();
        let ab = compare(&a, &b).unwrap();
        let ba = compare(&b, &a).unwrap();
        prop_assert_eq!(ab.truncated_length, a.len().min(b.len()));
        prop_assert!((ab.mse - ba.mse).abs() <= 1e-9 * ab.mse.max(1.0));
        prop_assert!((ab.cosine_similarity - ba.cosine_similarity).abs() <= 1e-12);
    }
}
