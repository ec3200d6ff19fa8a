//! Scan report, operator hints and suggested configuration

use anyhow::{Context, Result};
use ew1_registers::{DataType, RegisterDefinition, RegisterType, ScanResult};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanRange {
    pub start: u16,
    pub end: u16,
}

/// Saved scan output
#[derive(Debug, Serialize)]
pub struct ScanReport<'a> {
    pub host: &'a str,
    pub port: u16,
    pub unit_id: u8,
    pub scan_range: ScanRange,
    pub results: &'a [ScanResult],
}

impl ScanReport<'_> {
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// Readings of one raw word that are worth a look
pub fn interpret(raw: u16) -> Vec<String> {
    let mut hints = vec![format!("uint16: {raw}")];

    let signed = raw as i16;
    if i32::from(signed) != i32::from(raw) {
        hints.push(format!("int16: {signed}"));
    }

    let temperature = f64::from(signed) / 10.0;
    if temperature > -50.0 && temperature < 150.0 {
        hints.push(format!("temp(÷10): {temperature:.1}°C"));
    }

    if raw <= 1000 {
        hints.push(format!("pct(÷10): {:.1}%", f64::from(raw) / 10.0));
    }

    hints
}

/// Starting-point register map: every readable address as a scaled int16.
///
/// Names are `reg_<addr>`; an address readable under several types gets the
/// type appended after its first entry so names stay unique.
pub fn suggested_registers(results: &[ScanResult]) -> Vec<RegisterDefinition> {
    let mut used = HashSet::new();
    results
        .iter()
        .filter(|r| r.success)
        .map(|r| {
            let mut name = format!("reg_{}", r.address);
            if !used.insert(name.clone()) {
                name = format!("{}_{}", name, r.register_type);
                used.insert(name.clone());
            }
            let reg = RegisterDefinition::new(r.address, name)
                .with_description(format!("Register {}", r.address))
                .with_register_type(r.register_type);
            if r.register_type.is_word() {
                reg.with_data_type(DataType::Int16).with_scale(0.1)
            } else {
                reg
            }
        })
        .collect()
}

#[derive(Serialize)]
struct SuggestedConfig<'a> {
    registers: &'a [RegisterDefinition],
}

/// `{"registers": [...]}` ready to paste into the logger configuration
pub fn suggested_config_json(registers: &[RegisterDefinition]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&SuggestedConfig { registers })?)
}

/// Results of one register type, keeping address order
pub fn of_type(results: &[ScanResult], register_type: RegisterType) -> Vec<&ScanResult> {
    results
        .iter()
        .filter(|r| r.register_type == register_type)
        .collect()
}
