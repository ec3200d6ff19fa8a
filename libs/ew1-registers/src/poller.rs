//! Register poller
//!
//! Reads a configured register map once and returns scaled values keyed by
//! register name. A failed register becomes `None`, never zero.

use serde::Serialize;
use tracing::{debug, warn};

use crate::codec;
use crate::error::PollError;
use crate::reader::RegisterReader;
use crate::types::{DataType, RegisterDefinition, RegisterType};

/// Values from one poll, in register map order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PollSnapshot {
    values: Vec<(String, Option<f64>)>,
}

impl PollSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: Option<f64>) {
        self.values.push((name.into(), value));
    }

    /// Value for `name`; `None` when missing or unreadable
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    /// Names in the order they were read
    pub fn names(&self) -> Vec<&str> {
        self.values.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Number of registers read successfully
    pub fn successful(&self) -> usize {
        self.values.iter().filter(|(_, v)| v.is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, Option<f64>)> for PollSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, Option<f64>)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Read and decode one register.
///
/// Word registers read [`RegisterDefinition::word_count`] words and decode
/// them with the register's scale. Bit registers yield 1.0 or 0.0 times the
/// scale.
pub async fn read_register<R>(reader: &mut R, reg: &RegisterDefinition) -> Result<f64, PollError>
where
    R: RegisterReader + ?Sized,
{
    let value = if reg.register_type.is_word() {
        let words = reader
            .read_words(reg.register_type, reg.address, reg.word_count())
            .await?;
        codec::decode(&words, reg.data_type, reg.scale)?
    } else {
        let bit = reader.read_bit(reg.register_type, reg.address).await?;
        f64::from(u8::from(bit)) * reg.scale
    };

    debug!("{} = {} {}", reg.name, value, reg.unit);
    Ok(value)
}

/// Read every register in `registers`, in order.
///
/// Failures are logged and recorded as `None`; the poll always completes.
pub async fn read_all<R>(reader: &mut R, registers: &[RegisterDefinition]) -> PollSnapshot
where
    R: RegisterReader + ?Sized,
{
    let mut snapshot = PollSnapshot::new();
    for reg in registers {
        let value = match read_register(reader, reg).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Failed to read {} ({} {}): {}", reg.name, reg.register_type, reg.address, e);
                None
            },
        };
        snapshot.push(reg.name.clone(), value);
    }
    snapshot
}

/// Example EW-1 map: six input temperature sensors in tenths of a degree
pub fn default_registers() -> Vec<RegisterDefinition> {
    (0..6u16)
        .map(|i| {
            RegisterDefinition::new(i, format!("temp_{}", i + 1))
                .with_description(format!("Temperature Sensor {}", i + 1))
                .with_register_type(RegisterType::Input)
                .with_data_type(DataType::Int16)
                .with_scale(0.1)
                .with_unit("°C")
        })
        .collect()
}
