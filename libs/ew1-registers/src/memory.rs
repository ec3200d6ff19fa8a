//! In-memory device
//!
//! A register map held in memory that answers reads the way a Modbus server
//! would: a request touching any unmapped address fails with an illegal data
//! address exception. Used by tests and for dry runs without hardware.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

use crate::codec;
use crate::error::{ReadError, Result};
use crate::reader::RegisterReader;
use crate::types::{DataType, RegisterType};

const ILLEGAL_DATA_ADDRESS: &str = "Illegal data address";

/// Simulated EW-1 register map
#[derive(Debug, Clone, Default)]
pub struct MemoryDevice {
    holding: BTreeMap<u16, u16>,
    input: BTreeMap<u16, u16>,
    coils: BTreeMap<u16, bool>,
    discrete: BTreeMap<u16, bool>,
    /// Addresses that time out regardless of table
    failing: BTreeSet<u16>,
    requests: usize,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set consecutive word registers starting at `address`
    pub fn with_words(mut self, register_type: RegisterType, address: u16, words: &[u16]) -> Self {
        self.set_words(register_type, address, words);
        self
    }

    /// Store a raw value using the big-endian layout of `data_type`
    pub fn with_value(
        mut self,
        register_type: RegisterType,
        address: u16,
        data_type: DataType,
        raw: f64,
    ) -> Self {
        let words = codec::encode(raw, data_type);
        self.set_words(register_type, address, &words);
        self
    }

    pub fn with_bit(mut self, register_type: RegisterType, address: u16, value: bool) -> Self {
        match register_type {
            RegisterType::Coil => {
                self.coils.insert(address, value);
            },
            RegisterType::Discrete => {
                self.discrete.insert(address, value);
            },
            RegisterType::Holding | RegisterType::Input => {
                self.set_words(register_type, address, &[u16::from(value)]);
            },
        }
        self
    }

    /// Make every request touching `address` time out
    pub fn with_failure(mut self, address: u16) -> Self {
        self.failing.insert(address);
        self
    }

    pub fn set_words(&mut self, register_type: RegisterType, address: u16, words: &[u16]) {
        let table = match register_type {
            RegisterType::Holding => &mut self.holding,
            RegisterType::Input => &mut self.input,
            RegisterType::Coil | RegisterType::Discrete => return,
        };
        for (offset, word) in words.iter().enumerate() {
            if let Some(addr) = address.checked_add(offset as u16) {
                table.insert(addr, *word);
            }
        }
    }

    /// Number of read requests answered or refused so far
    pub fn request_count(&self) -> usize {
        self.requests
    }

    fn check_failing(&self, address: u16, count: u16) -> Result<()> {
        let end = address.saturating_add(count.saturating_sub(1));
        match self.failing.range(address..=end).next() {
            Some(&failed) => Err(ReadError::Timeout { address: failed }),
            None => Ok(()),
        }
    }

    fn read_table(
        &mut self,
        register_type: RegisterType,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>> {
        self.requests += 1;
        self.check_failing(address, count)?;

        let table = match register_type {
            RegisterType::Holding => &self.holding,
            RegisterType::Input => &self.input,
            RegisterType::Coil | RegisterType::Discrete => {
                return Err(ReadError::WrongKind(register_type, "words"))
            },
        };

        (0..count)
            .map(|offset| {
                address
                    .checked_add(offset)
                    .and_then(|addr| table.get(&addr).copied())
                    .ok_or_else(|| ReadError::Exception {
                        address,
                        message: ILLEGAL_DATA_ADDRESS.to_string(),
                    })
            })
            .collect()
    }

    fn read_bit_table(&mut self, register_type: RegisterType, address: u16) -> Result<bool> {
        self.requests += 1;
        self.check_failing(address, 1)?;

        let table = match register_type {
            RegisterType::Coil => &self.coils,
            RegisterType::Discrete => &self.discrete,
            RegisterType::Holding | RegisterType::Input => {
                return Err(ReadError::WrongKind(register_type, "bits"))
            },
        };

        table
            .get(&address)
            .copied()
            .ok_or_else(|| ReadError::Exception {
                address,
                message: ILLEGAL_DATA_ADDRESS.to_string(),
            })
    }
}

#[async_trait]
impl RegisterReader for MemoryDevice {
    async fn read_holding(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        self.read_table(RegisterType::Holding, address, count)
    }

    async fn read_input(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        self.read_table(RegisterType::Input, address, count)
    }

    async fn read_coil(&mut self, address: u16) -> Result<bool> {
        self.read_bit_table(RegisterType::Coil, address)
    }

    async fn read_discrete(&mut self, address: u16) -> Result<bool> {
        self.read_bit_table(RegisterType::Discrete, address)
    }
}
