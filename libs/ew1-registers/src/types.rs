//! Register map data types
//!
//! Register kinds, numeric layouts and the register definitions consumed by the
//! poller. Scan results live in [`crate::scanner`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Modbus register table
///
/// Declaration order is the probe order used by the scanner.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RegisterType {
    /// Read/write 16-bit words (FC03)
    #[default]
    Holding,
    /// Read-only 16-bit words (FC04)
    Input,
    /// Read/write single bits (FC01)
    Coil,
    /// Read-only single bits (FC02)
    Discrete,
}

impl RegisterType {
    /// All register types in probe order
    pub const ALL: [RegisterType; 4] = [
        RegisterType::Holding,
        RegisterType::Input,
        RegisterType::Coil,
        RegisterType::Discrete,
    ];

    /// Word-addressed tables that can hold multi-word values
    pub fn is_word(self) -> bool {
        matches!(self, RegisterType::Holding | RegisterType::Input)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RegisterType::Holding => "holding",
            RegisterType::Input => "input",
            RegisterType::Coil => "coil",
            RegisterType::Discrete => "discrete",
        }
    }
}

impl fmt::Display for RegisterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegisterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "holding" | "hr" => Ok(RegisterType::Holding),
            "input" | "ir" => Ok(RegisterType::Input),
            "coil" | "coils" => Ok(RegisterType::Coil),
            "discrete" | "di" => Ok(RegisterType::Discrete),
            other => Err(format!("unknown register type: {other}")),
        }
    }
}

/// Numeric layout of a word register value
///
/// 32-bit types span two consecutive registers, most significant word first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
}

impl DataType {
    const SINGLE_WORD: [DataType; 2] = [DataType::UInt16, DataType::Int16];
    const DOUBLE_WORD: [DataType; 3] = [DataType::UInt32, DataType::Int32, DataType::Float32];

    /// Number of 16-bit registers occupied by one value
    pub fn word_count(self) -> u16 {
        match self {
            DataType::UInt16 | DataType::Int16 => 1,
            DataType::UInt32 | DataType::Int32 | DataType::Float32 => 2,
        }
    }

    /// One-word candidate types in declaration order
    pub fn single_word() -> &'static [DataType] {
        &Self::SINGLE_WORD
    }

    /// Two-word candidate types in declaration order
    pub fn double_word() -> &'static [DataType] {
        &Self::DOUBLE_WORD
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::UInt16 => "uint16",
            DataType::Int16 => "int16",
            DataType::UInt32 => "uint32",
            DataType::Int32 => "int32",
            DataType::Float32 => "float32",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "uint16" | "u16" => Ok(DataType::UInt16),
            "int16" | "i16" => Ok(DataType::Int16),
            "uint32" | "u32" => Ok(DataType::UInt32),
            "int32" | "i32" => Ok(DataType::Int32),
            "float32" | "f32" | "float" => Ok(DataType::Float32),
            other => Err(format!("unknown data type: {other}")),
        }
    }
}

/// One register in the logged map
///
/// `name` doubles as the output column and must be unique within a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDefinition {
    pub address: u16,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub register_type: RegisterType,
    /// Only meaningful for holding/input registers
    #[serde(default)]
    pub data_type: DataType,
    /// Multiplier applied after decoding
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub unit: String,
}

fn default_scale() -> f64 {
    1.0
}

impl RegisterDefinition {
    /// Holding register, uint16, unscaled
    pub fn new(address: u16, name: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
            description: String::new(),
            register_type: RegisterType::default(),
            data_type: DataType::default(),
            scale: default_scale(),
            unit: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_register_type(mut self, register_type: RegisterType) -> Self {
        self.register_type = register_type;
        self
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Registers to request for one value; bit tables always read one
    pub fn word_count(&self) -> u16 {
        if self.register_type.is_word() {
            self.data_type.word_count()
        } else {
            1
        }
    }
}
