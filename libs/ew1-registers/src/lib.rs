//! EW-1 register library
//!
//! Decoding and discovery of Modbus registers on the ERAB EW-1 heating
//! controller:
//! - `codec`: raw register words to scaled values
//! - `scanner`: probing an unknown register map
//! - `poller`: reading a configured register map
//! - `reader`: the read capability every device implements
//! - `client`: Modbus TCP reader (feature `tcp`)

pub mod codec;
pub mod error;
pub mod memory;
pub mod poller;
pub mod reader;
pub mod scanner;
pub mod types;

#[cfg(feature = "tcp")]
pub mod client;

pub use codec::{decode, word_count};
pub use error::{CodecError, PollError, ReadError, ScanError};
pub use memory::MemoryDevice;
pub use poller::{default_registers, read_all, read_register, PollSnapshot};
pub use reader::RegisterReader;
pub use scanner::{scan, Candidate, RawReading, ScanResult};
pub use types::{DataType, RegisterDefinition, RegisterType};

#[cfg(feature = "tcp")]
pub use client::{ModbusTcpReader, TcpSettings};
