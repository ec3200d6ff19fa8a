//! Register scanner
//!
//! Sweeps an address range on a device with an unknown register map and
//! records what every (address, register type) pair returns. Nothing is
//! discarded and no data type is guessed: every numeric interpretation is
//! kept so the operator can pick the plausible one.
//!
//! Strategy per address, register types in [`RegisterType::ALL`] order:
//! 1. Holding/Input: one-word read decoded as uint16/int16, then (when the
//!    next address is inside the range) a two-word read decoded as
//!    uint32/int32/float32
//! 2. Coil/Discrete: one-bit read, recorded as-is
//! 3. Any failed read marks that pair unreadable and the sweep moves on

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::codec;
use crate::error::{ReadError, ScanError};
use crate::reader::RegisterReader;
use crate::types::{DataType, RegisterType};

/// Raw data returned by a successful probe
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawReading {
    /// One-word read of a holding/input register
    Words(Vec<u16>),
    /// Coil or discrete input state
    Bit(bool),
}

/// One numeric interpretation of the words at an address
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub data_type: DataType,
    /// Words the value was decoded from (one or two)
    pub words: Vec<u16>,
    /// Unscaled value; NaN serializes as null
    pub value: f64,
    /// False for saturated words or NaN floats
    pub plausible: bool,
}

/// Values compare by bit pattern so identical NaN reads are equal
impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.data_type == other.data_type
            && self.words == other.words
            && self.value.to_bits() == other.value.to_bits()
            && self.plausible == other.plausible
    }
}

impl Candidate {
    fn decode(words: &[u16], data_type: DataType) -> Result<Self, crate::error::CodecError> {
        let value = codec::decode_raw(words, data_type)?;
        Ok(Self {
            data_type,
            words: words.to_vec(),
            value,
            plausible: codec::is_plausible(words, data_type, value),
        })
    }
}

/// Outcome of probing one address under one register type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub address: u16,
    pub register_type: RegisterType,
    pub success: bool,
    /// Absent when the address could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawReading>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanResult {
    fn unreadable(address: u16, register_type: RegisterType, error: &ReadError) -> Self {
        Self {
            address,
            register_type,
            success: false,
            raw: None,
            candidates: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    fn words(
        address: u16,
        register_type: RegisterType,
        words: Vec<u16>,
        candidates: Vec<Candidate>,
    ) -> Self {
        Self {
            address,
            register_type,
            success: true,
            raw: Some(RawReading::Words(words)),
            candidates,
            error: None,
        }
    }

    fn bit(address: u16, register_type: RegisterType, value: bool) -> Self {
        Self {
            address,
            register_type,
            success: true,
            raw: Some(RawReading::Bit(value)),
            candidates: Vec::new(),
            error: None,
        }
    }

    /// The one-word value read at this address, if any
    pub fn word(&self) -> Option<u16> {
        match &self.raw {
            Some(RawReading::Words(words)) => words.first().copied(),
            _ => None,
        }
    }

    /// The bit read at this address, if any
    pub fn bit_value(&self) -> Option<bool> {
        match self.raw {
            Some(RawReading::Bit(value)) => Some(value),
            _ => None,
        }
    }

    pub fn candidate(&self, data_type: DataType) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.data_type == data_type)
    }

    /// Plausible candidates in declaration order
    pub fn plausible_candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter().filter(|c| c.plausible)
    }
}

/// Scan `start..=end` for every requested register type.
///
/// # Arguments
/// * `reader` - Device connection, held exclusively for the whole sweep
/// * `start` - First address
/// * `end` - Last address (inclusive)
/// * `register_types` - Tables to probe; order and duplicates are ignored
///
/// # Returns
/// One result per (address, register type) in ascending address order and
/// fixed probe order, or `ScanError::InvalidRange` before any read when the
/// range is inverted or no register type was requested.
pub async fn scan<R>(
    reader: &mut R,
    start: u16,
    end: u16,
    register_types: &[RegisterType],
) -> Result<Vec<ScanResult>, ScanError>
where
    R: RegisterReader + ?Sized,
{
    if start > end {
        return Err(ScanError::InvalidRange(format!(
            "start {start} is greater than end {end}"
        )));
    }
    if register_types.is_empty() {
        return Err(ScanError::InvalidRange(
            "no register types requested".to_string(),
        ));
    }

    let probe_order: Vec<RegisterType> = RegisterType::ALL
        .into_iter()
        .filter(|t| register_types.contains(t))
        .collect();

    info!(
        "Scanning {}-{} for {:?} ({} addresses)",
        start,
        end,
        probe_order,
        u32::from(end - start) + 1
    );

    let mut results = Vec::with_capacity((usize::from(end - start) + 1) * probe_order.len());
    for address in start..=end {
        for &register_type in &probe_order {
            let result = probe(reader, address, end, register_type).await;
            if result.success {
                trace!("{} {} readable", register_type, address);
            }
            results.push(result);
        }
    }

    let found = results.iter().filter(|r| r.success).count();
    info!("Scan complete: {}/{} probes readable", found, results.len());

    Ok(results)
}

/// Probe a single (address, register type) pair; never fails
pub async fn probe<R>(
    reader: &mut R,
    address: u16,
    end: u16,
    register_type: RegisterType,
) -> ScanResult
where
    R: RegisterReader + ?Sized,
{
    if !register_type.is_word() {
        return match reader.read_bit(register_type, address).await {
            Ok(value) => ScanResult::bit(address, register_type, value),
            Err(e) => {
                debug!("{} {} unreadable: {}", register_type, address, e);
                ScanResult::unreadable(address, register_type, &e)
            },
        };
    }

    let words = match reader.read_words(register_type, address, 1).await {
        Ok(words) => words,
        Err(e) => {
            debug!("{} {} unreadable: {}", register_type, address, e);
            return ScanResult::unreadable(address, register_type, &e);
        },
    };

    let mut candidates = decode_candidates(&words, DataType::single_word());

    if address < end {
        match reader.read_words(register_type, address, 2).await {
            Ok(pair) => candidates.extend(decode_candidates(&pair, DataType::double_word())),
            Err(e) => trace!("{} {} has no two-word value: {}", register_type, address, e),
        }
    }

    ScanResult::words(address, register_type, words, candidates)
}

fn decode_candidates(words: &[u16], data_types: &[DataType]) -> Vec<Candidate> {
    data_types
        .iter()
        .filter_map(|&data_type| match Candidate::decode(words, data_type) {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                warn!("Skipping candidate: {}", e);
                None
            },
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::memory::MemoryDevice;
    use tracing_test::traced_test;

    #[tokio::test]
    async fn test_inverted_range_rejected_before_reading() {
        let mut device = MemoryDevice::new();
        let err = scan(&mut device, 50, 10, &[RegisterType::Holding])
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidRange(_)));
        assert_eq!(device.request_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_type_set_rejected() {
        let mut device = MemoryDevice::new();
        let err = scan(&mut device, 0, 10, &[]).await.unwrap_err();
        assert!(err.to_string().contains("no register types"));
        assert_eq!(device.request_count(), 0);
    }

    #[tokio::test]
    async fn test_single_address_range() {
        let mut device = MemoryDevice::new().with_words(RegisterType::Holding, 7, &[250, 1]);
        let results = scan(&mut device, 7, 7, &[RegisterType::Holding])
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        // Next address is outside the range: no two-word probe
        assert_eq!(results[0].candidates.len(), 2);
        assert_eq!(device.request_count(), 1);
    }

    #[tokio::test]
    async fn test_word_candidates() {
        let mut device =
            MemoryDevice::new().with_words(RegisterType::Input, 0, &[0xFFF6, 0x0000]);
        let results = scan(&mut device, 0, 1, &[RegisterType::Input]).await.unwrap();

        let first = &results[0];
        assert!(first.success);
        assert_eq!(first.word(), Some(0xFFF6));
        assert_eq!(first.candidate(DataType::UInt16).unwrap().value, 65526.0);
        assert_eq!(first.candidate(DataType::Int16).unwrap().value, -10.0);
        assert_eq!(
            first.candidate(DataType::UInt32).unwrap().words,
            vec![0xFFF6, 0x0000]
        );
        assert_eq!(first.candidates.len(), 5);

        // Last address only gets the one-word interpretations
        assert_eq!(results[1].candidates.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_pair_read_keeps_single_word() {
        let mut device = MemoryDevice::new().with_words(RegisterType::Holding, 4, &[42]);
        let results = scan(&mut device, 4, 5, &[RegisterType::Holding])
            .await
            .unwrap();

        assert!(results[0].success);
        assert_eq!(results[0].candidates.len(), 2);
        assert!(results[0].candidate(DataType::Float32).is_none());
        assert!(!results[1].success);
        assert!(results[1].raw.is_none());
        assert!(results[1].candidates.is_empty());
        assert!(results[1].error.is_some());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_unreadable_probe_is_logged() {
        let mut device = MemoryDevice::new().with_failure(3);
        let results = scan(&mut device, 3, 3, &[RegisterType::Input])
            .await
            .unwrap();
        assert!(!results[0].success);
        assert!(logs_contain("input 3 unreadable"));
        assert!(logs_contain("Scan complete: 0/1"));
    }

    #[tokio::test]
    async fn test_saturated_words_flagged() {
        let mut device =
            MemoryDevice::new().with_words(RegisterType::Holding, 0, &[0xFFFF, 0xFFFF]);
        let results = scan(&mut device, 0, 1, &[RegisterType::Holding])
            .await
            .unwrap();
        assert_eq!(results[0].plausible_candidates().count(), 0);
        // Raw data is still retained
        assert_eq!(results[0].word(), Some(0xFFFF));
    }

    #[tokio::test]
    async fn test_nan_float_flagged_but_integers_kept() {
        let mut device =
            MemoryDevice::new().with_words(RegisterType::Holding, 0, &[0x7FC0, 0x0000]);
        let results = scan(&mut device, 0, 1, &[RegisterType::Holding])
            .await
            .unwrap();
        let first = &results[0];
        assert!(!first.candidate(DataType::Float32).unwrap().plausible);
        assert!(first.candidate(DataType::UInt32).unwrap().plausible);
    }

    #[tokio::test]
    async fn test_nan_results_compare_equal() {
        let mut device =
            MemoryDevice::new().with_words(RegisterType::Holding, 0, &[0x7FC0, 0x0000]);
        let a = scan(&mut device, 0, 1, &[RegisterType::Holding])
            .await
            .unwrap();
        let b = scan(&mut device, 0, 1, &[RegisterType::Holding])
            .await
            .unwrap();
        assert!(a[0].candidate(DataType::Float32).unwrap().value.is_nan());
        assert_eq!(a, a.clone());
        assert_eq!(a, b);
    }

    #[test]
    fn test_candidate_equality_uses_value_bits() {
        let nan = Candidate::decode(&[0x7FC0, 0x0000], DataType::Float32).unwrap();
        assert_eq!(nan, nan.clone());

        let positive = Candidate::decode(&[0x0000, 0x0000], DataType::Float32).unwrap();
        let mut negative = positive.clone();
        negative.value = -0.0;
        assert_ne!(positive, negative);
    }

    #[tokio::test]
    async fn test_bits_recorded_directly() {
        let mut device = MemoryDevice::new()
            .with_bit(RegisterType::Coil, 2, true)
            .with_bit(RegisterType::Discrete, 2, false);
        let results = scan(
            &mut device,
            2,
            2,
            &[RegisterType::Discrete, RegisterType::Coil],
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].register_type, RegisterType::Coil);
        assert_eq!(results[0].bit_value(), Some(true));
        assert_eq!(results[1].register_type, RegisterType::Discrete);
        assert_eq!(results[1].bit_value(), Some(false));
        assert!(results.iter().all(|r| r.candidates.is_empty()));
    }

    #[tokio::test]
    async fn test_serialized_shape() {
        let mut device = MemoryDevice::new()
            .with_words(RegisterType::Holding, 0, &[250])
            .with_bit(RegisterType::Coil, 0, true);
        let results = scan(
            &mut device,
            0,
            0,
            &[RegisterType::Holding, RegisterType::Coil, RegisterType::Input],
        )
        .await
        .unwrap();

        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json[0]["register_type"], "holding");
        assert_eq!(json[0]["raw"], serde_json::json!([250]));
        assert_eq!(json[0]["candidates"][1]["data_type"], "int16");
        assert_eq!(json[1]["register_type"], "input");
        assert_eq!(json[1]["success"], false);
        assert!(json[1].get("raw").is_none());
        assert_eq!(json[2]["raw"], true);
    }
}
