//! Register codec
//!
//! Converts raw register words into scaled engineering values and back.
//! Multi-word values are big-endian: the first register holds the most
//! significant word.

use tracing::trace;

use crate::error::CodecError;
use crate::types::DataType;

/// Number of 16-bit registers required by `data_type`
pub fn word_count(data_type: DataType) -> u16 {
    data_type.word_count()
}

/// Decode register words into a scaled value.
///
/// # Arguments
/// * `words` - Raw register words, exactly `word_count(data_type)` of them
/// * `data_type` - Numeric layout of the value
/// * `scale` - Multiplier applied after decoding
///
/// # Returns
/// The scaled value as `f64`, or `CodecError::MalformedValue` when the word
/// count does not match the data type. Float32 NaN/Inf are passed through.
pub fn decode(words: &[u16], data_type: DataType, scale: f64) -> Result<f64, CodecError> {
    let raw = match (data_type, words) {
        (DataType::UInt16, &[word]) => f64::from(word),
        (DataType::Int16, &[word]) => f64::from(word as i16),
        (DataType::UInt32, &[high, low]) => f64::from(compose_u32(high, low)),
        (DataType::Int32, &[high, low]) => f64::from(compose_u32(high, low) as i32),
        (DataType::Float32, &[high, low]) => f64::from(f32::from_bits(compose_u32(high, low))),
        _ => {
            return Err(CodecError::MalformedValue {
                data_type,
                expected: usize::from(data_type.word_count()),
                actual: words.len(),
            })
        },
    };

    trace!(
        "Decoded {}: words={:04X?}, raw={}, scale={}",
        data_type,
        words,
        raw,
        scale
    );

    Ok(raw * scale)
}

/// Decode without scaling
pub fn decode_raw(words: &[u16], data_type: DataType) -> Result<f64, CodecError> {
    decode(words, data_type, 1.0)
}

/// Encode a raw (unscaled) value into register words.
///
/// Integer targets saturate at the type's range; fractional parts are
/// truncated toward zero.
pub fn encode(value: f64, data_type: DataType) -> Vec<u16> {
    match data_type {
        DataType::UInt16 => vec![value as u16],
        DataType::Int16 => vec![(value as i16) as u16],
        DataType::UInt32 => split_u32(value as u32).to_vec(),
        DataType::Int32 => split_u32((value as i32) as u32).to_vec(),
        DataType::Float32 => split_u32((value as f32).to_bits()).to_vec(),
    }
}

/// Whether a decoded candidate looks like live data.
///
/// Saturated registers (every word 0xFFFF) and NaN floats are flagged as
/// implausible. Used for ranking only.
pub fn is_plausible(words: &[u16], data_type: DataType, value: f64) -> bool {
    let saturated = !words.is_empty() && words.iter().all(|&w| w == 0xFFFF);
    let nan = data_type == DataType::Float32 && value.is_nan();
    !saturated && !nan
}

/// Compose two big-endian words into a 32-bit pattern
pub fn compose_u32(high: u16, low: u16) -> u32 {
    let [a, b] = high.to_be_bytes();
    let [c, d] = low.to_be_bytes();
    u32::from_be_bytes([a, b, c, d])
}

/// Split a 32-bit pattern into big-endian words
pub fn split_u32(value: u32) -> [u16; 2] {
    let [a, b, c, d] = value.to_be_bytes();
    [u16::from_be_bytes([a, b]), u16::from_be_bytes([c, d])]
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    const ALL_TYPES: [DataType; 5] = [
        DataType::UInt16,
        DataType::Int16,
        DataType::UInt32,
        DataType::Int32,
        DataType::Float32,
    ];

    // ============================================================================
    // Boundaries
    // ============================================================================

    #[test]
    fn test_int16_boundaries() {
        assert_eq!(decode(&[0x8000], DataType::Int16, 1.0).unwrap(), -32768.0);
        assert_eq!(decode(&[0x7FFF], DataType::Int16, 1.0).unwrap(), 32767.0);
        assert_eq!(decode(&[0xFFFF], DataType::Int16, 1.0).unwrap(), -1.0);
    }

    #[test]
    fn test_uint16_max() {
        assert_eq!(decode(&[0xFFFF], DataType::UInt16, 1.0).unwrap(), 65535.0);
        assert_eq!(decode(&[0x0000], DataType::UInt16, 1.0).unwrap(), 0.0);
    }

    #[test]
    fn test_32bit_boundaries() {
        assert_eq!(
            decode(&[0xFFFF, 0xFFFF], DataType::UInt32, 1.0).unwrap(),
            4_294_967_295.0
        );
        assert_eq!(
            decode(&[0x8000, 0x0000], DataType::Int32, 1.0).unwrap(),
            -2_147_483_648.0
        );
        assert_eq!(decode(&[0xFFFF, 0xFFFF], DataType::Int32, 1.0).unwrap(), -1.0);
    }

    #[test]
    fn test_word_order_is_big_endian() {
        assert_eq!(
            decode(&[0x0001, 0x0000], DataType::UInt32, 1.0).unwrap(),
            65536.0
        );
        assert_eq!(decode(&[0x0000, 0x0001], DataType::UInt32, 1.0).unwrap(), 1.0);
    }

    #[test]
    fn test_float32_known_pattern() {
        // 0x41C80000 = 25.0
        assert_eq!(
            decode(&[0x41C8, 0x0000], DataType::Float32, 1.0).unwrap(),
            25.0
        );
        // 0xC0490FDB ~ -pi
        let value = decode(&[0xC049, 0x0FDB], DataType::Float32, 1.0).unwrap();
        assert_eq!(value, f64::from(-std::f32::consts::PI));
    }

    #[test]
    fn test_float32_nan_and_inf_pass_through() {
        assert!(decode(&[0x7FC0, 0x0000], DataType::Float32, 1.0)
            .unwrap()
            .is_nan());
        assert_eq!(
            decode(&[0x7F80, 0x0000], DataType::Float32, 1.0).unwrap(),
            f64::INFINITY
        );
        assert_eq!(
            decode(&[0xFF80, 0x0000], DataType::Float32, 1.0).unwrap(),
            f64::NEG_INFINITY
        );
    }

    // ============================================================================
    // Composition law and scaling
    // ============================================================================

    #[test]
    fn test_composition_law_for_32bit_patterns() {
        let patterns = [
            0x0000_0000u32,
            0x0000_0001,
            0x0001_0000,
            0x1234_5678,
            0x7FFF_FFFF,
            0x8000_0000,
            0xDEAD_BEEF,
            0x41C8_0000,
            0xFFFF_FFFE,
            0xFFFF_FFFF,
        ];

        for pattern in patterns {
            let words = split_u32(pattern);
            assert_eq!(
                decode(&words, DataType::UInt32, 1.0).unwrap(),
                f64::from(pattern)
            );
            assert_eq!(
                decode(&words, DataType::Int32, 1.0).unwrap(),
                f64::from(pattern as i32)
            );
            let float = decode(&words, DataType::Float32, 1.0).unwrap();
            let expected = f32::from_bits(pattern);
            if expected.is_nan() {
                assert!(float.is_nan());
            } else {
                assert_eq!((float as f32).to_bits(), expected.to_bits());
            }
        }
    }

    #[test]
    fn test_scale_linearity() {
        let samples: [(&[u16], DataType); 5] = [
            (&[0x00FA], DataType::UInt16),
            (&[0xFF9C], DataType::Int16),
            (&[0x0001, 0x86A0], DataType::UInt32),
            (&[0xFFFE, 0x7960], DataType::Int32),
            (&[0x41C8, 0x0000], DataType::Float32),
        ];

        for (words, data_type) in samples {
            let unscaled = decode(words, data_type, 1.0).unwrap();
            for scale in [0.1, 1.0, 10.0, -1.0] {
                assert_eq!(decode(words, data_type, scale).unwrap(), unscaled * scale);
            }
        }
    }

    #[test]
    fn test_scaled_temperature() {
        let value = decode(&[0x00FA], DataType::Int16, 0.1).unwrap();
        assert!((value - 25.0).abs() < 1e-9);
        let value = decode(&[0xFF9C], DataType::Int16, 0.1).unwrap();
        assert!((value + 10.0).abs() < 1e-9);
    }

    // ============================================================================
    // Malformed input
    // ============================================================================

    #[test]
    fn test_word_count_mismatch() {
        let err = decode(&[0x0001], DataType::UInt32, 1.0).unwrap_err();
        assert_eq!(
            err,
            CodecError::MalformedValue {
                data_type: DataType::UInt32,
                expected: 2,
                actual: 1,
            }
        );
        assert!(err.to_string().contains("expected 2"));
    }

    #[test]
    fn test_every_type_rejects_wrong_lengths() {
        for data_type in ALL_TYPES {
            assert!(decode(&[], data_type, 1.0).is_err());
            assert!(decode(&[0, 0, 0], data_type, 1.0).is_err());
            let wrong = if data_type.word_count() == 1 {
                vec![0, 0]
            } else {
                vec![0]
            };
            assert!(decode(&wrong, data_type, 1.0).is_err());
        }
    }

    // ============================================================================
    // Encoding and plausibility
    // ============================================================================

    #[test]
    fn test_encode_matches_decode() {
        assert_eq!(encode(-10.0, DataType::Int16), vec![0xFFF6]);
        assert_eq!(encode(65536.0, DataType::UInt32), vec![0x0001, 0x0000]);
        assert_eq!(encode(-2.0, DataType::Int32), vec![0xFFFF, 0xFFFE]);
        assert_eq!(encode(25.0, DataType::Float32), vec![0x41C8, 0x0000]);
        assert_eq!(decode_raw(&encode(1234.0, DataType::UInt16), DataType::UInt16).unwrap(), 1234.0);
    }

    #[test]
    fn test_encode_saturates() {
        assert_eq!(encode(70000.0, DataType::UInt16), vec![0xFFFF]);
        assert_eq!(encode(-5.0, DataType::UInt16), vec![0x0000]);
        assert_eq!(encode(-40000.0, DataType::Int16), vec![0x8000]);
    }

    #[test]
    fn test_plausibility() {
        assert!(is_plausible(&[0x00FA], DataType::UInt16, 250.0));
        assert!(!is_plausible(&[0xFFFF], DataType::UInt16, 65535.0));
        assert!(!is_plausible(&[0xFFFF], DataType::Int16, -1.0));
        assert!(!is_plausible(&[0xFFFF, 0xFFFF], DataType::UInt32, 4_294_967_295.0));
        assert!(is_plausible(&[0xFFFF, 0x0000], DataType::UInt32, 4_294_901_760.0));
        assert!(!is_plausible(&[0x7FC0, 0x0000], DataType::Float32, f64::NAN));
        assert!(is_plausible(&[0x7F80, 0x0000], DataType::Float32, f64::INFINITY));
    }

    #[test]
    fn test_word_count_lookup() {
        for data_type in ALL_TYPES {
            assert_eq!(word_count(data_type), data_type.word_count());
        }
    }
}
