//! Read capability
//!
//! The narrow interface the scanner and poller use to talk to a device.
//! Any Modbus client can satisfy it; see [`crate::client`] for the TCP
//! implementation and [`crate::memory`] for the in-memory device.

use async_trait::async_trait;

use crate::error::{ReadError, Result};
use crate::types::RegisterType;

/// Four-operation read interface over one device connection
///
/// Methods take `&mut self`: a reader is a single connection and concurrent
/// requests on it are not allowed.
#[async_trait]
pub trait RegisterReader: Send {
    /// Read `count` holding registers (FC03)
    async fn read_holding(&mut self, address: u16, count: u16) -> Result<Vec<u16>>;

    /// Read `count` input registers (FC04)
    async fn read_input(&mut self, address: u16, count: u16) -> Result<Vec<u16>>;

    /// Read one coil (FC01)
    async fn read_coil(&mut self, address: u16) -> Result<bool>;

    /// Read one discrete input (FC02)
    async fn read_discrete(&mut self, address: u16) -> Result<bool>;

    /// Read words from a holding/input table, rejecting short responses
    async fn read_words(
        &mut self,
        register_type: RegisterType,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>> {
        let words = match register_type {
            RegisterType::Holding => self.read_holding(address, count).await?,
            RegisterType::Input => self.read_input(address, count).await?,
            RegisterType::Coil | RegisterType::Discrete => {
                return Err(ReadError::WrongKind(register_type, "words"))
            },
        };

        if words.len() != usize::from(count) {
            return Err(ReadError::ShortResponse {
                address,
                expected: usize::from(count),
                actual: words.len(),
            });
        }
        Ok(words)
    }

    /// Read a bit from a coil/discrete table
    async fn read_bit(&mut self, register_type: RegisterType, address: u16) -> Result<bool> {
        match register_type {
            RegisterType::Coil => self.read_coil(address).await,
            RegisterType::Discrete => self.read_discrete(address).await,
            RegisterType::Holding | RegisterType::Input => {
                Err(ReadError::WrongKind(register_type, "bits"))
            },
        }
    }
}
