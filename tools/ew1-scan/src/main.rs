//! ew1-scan - discover which registers an ERAB EW-1 answers
//!
//! Sweeps an address range, prints every readable register with its
//! possible interpretations and suggests a starting configuration for
//! the logger.

mod report;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use ew1_registers::{scan, ModbusTcpReader, RawReading, RegisterType, ScanResult, TcpSettings};
use report::{interpret, of_type, suggested_config_json, suggested_registers, ScanRange, ScanReport};

#[derive(Parser, Debug)]
#[command(name = "ew1-scan")]
#[command(about = "Scan Modbus registers on an ERAB EW-1")]
#[command(after_help = "Examples:
  ew1-scan 192.168.1.100
  ew1-scan 192.168.1.100 --start 0 --end 200
  ew1-scan 192.168.1.100 --type input
  ew1-scan 192.168.1.100 --all-types --output scan.json")]
struct Args {
    /// IP address or host name of the EW-1
    host: String,

    /// Modbus TCP port
    #[arg(long, default_value_t = 502)]
    port: u16,

    /// Modbus unit/slave id
    #[arg(long, default_value_t = 1)]
    unit: u8,

    /// First address
    #[arg(long, default_value_t = 0)]
    start: u16,

    /// Last address (inclusive)
    #[arg(long, default_value_t = 100)]
    end: u16,

    /// Register type to scan: holding, input, coil or discrete
    #[arg(long = "type", default_value = "holding")]
    register_type: RegisterType,

    /// Scan all register types
    #[arg(long)]
    all_types: bool,

    /// Connect and request timeout in seconds
    #[arg(long, default_value_t = 5.0)]
    timeout: f64,

    /// Save results to a JSON file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn register_types(&self) -> Vec<RegisterType> {
        if self.all_types {
            RegisterType::ALL.to_vec()
        } else {
            vec![self.register_type]
        }
    }

    fn settings(&self) -> Result<TcpSettings> {
        let timeout = match Duration::try_from_secs_f64(self.timeout) {
            Ok(timeout) if !timeout.is_zero() => timeout,
            _ => bail!("--timeout must be a positive number of seconds"),
        };
        let mut settings = TcpSettings::new(self.host.clone());
        settings.port = self.port;
        settings.unit_id = self.unit;
        settings.timeout = timeout;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    common::logging::init("ew1-scan", if args.verbose { "debug" } else { "warn" })
        .context("Failed to initialize logging")?;

    let settings = args.settings()?;
    let register_types = args.register_types();

    println!("Connecting to {}...", settings.endpoint().bright_cyan());
    let mut reader = match ModbusTcpReader::connect(&settings).await {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("{} {}", "Connection error:".red(), e);
            return Ok(ExitCode::FAILURE);
        },
    };

    println!(
        "Scanning {} registers {}-{}...",
        register_types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        args.start,
        args.end
    );
    let scanned = scan(&mut reader, args.start, args.end, &register_types).await;
    reader.disconnect().await;
    let results = scanned?;

    for register_type in RegisterType::ALL
        .into_iter()
        .filter(|t| register_types.contains(t))
    {
        print_type(&of_type(&results, register_type), register_type, &args);
    }

    if let Some(path) = &args.output {
        ScanReport {
            host: &args.host,
            port: args.port,
            unit_id: args.unit,
            scan_range: ScanRange {
                start: args.start,
                end: args.end,
            },
            results: &results,
        }
        .save(path)?;
        println!("\nResults saved to {}", path.display().to_string().bright_cyan());
    }

    let suggested = suggested_registers(&results);
    if !suggested.is_empty() {
        let rule = "=".repeat(80);
        println!("\n{}", rule.bright_blue());
        println!("{}", "SUGGESTED CONFIGURATION".bold());
        println!("{}", rule.bright_blue());
        println!("\nAdd these to your registers.json configuration file:");
        println!("{}", suggested_config_json(&suggested)?);
    }

    Ok(ExitCode::SUCCESS)
}

fn print_type(results: &[&ScanResult], register_type: RegisterType, args: &Args) {
    let found: Vec<&&ScanResult> = results.iter().filter(|r| r.success).collect();
    if found.is_empty() {
        println!(
            "\n  No {} registers found in range {}-{}",
            register_type, args.start, args.end
        );
        return;
    }

    println!(
        "\n{}",
        format!("Found {} {} registers:", found.len(), register_type).bright_green()
    );
    println!("{}", "-".repeat(80));
    for result in found {
        println!("{}", format_result(result));
    }
}

fn format_result(result: &ScanResult) -> String {
    match &result.raw {
        Some(RawReading::Bit(value)) => format!("  [{:5}] {}", result.address, value),
        Some(RawReading::Words(words)) => {
            let raw = words.first().copied().unwrap_or_default();
            let mut line = format!(
                "  [{:5}] Raw: {:5} (0x{:04X}) | {}",
                result.address,
                raw,
                raw,
                interpret(raw).join(" | ")
            );

            let wide: Vec<String> = result
                .candidates
                .iter()
                .filter(|c| c.words.len() == 2)
                .map(|c| {
                    let text = format!("{}: {}", c.data_type, c.value);
                    if c.plausible {
                        text
                    } else {
                        text.dimmed().to_string()
                    }
                })
                .collect();
            if !wide.is_empty() {
                line.push_str(&format!("\n          {}", wide.join(" | ")));
            }
            line
        },
        None => format!("  [{:5}] unreadable", result.address),
    }
}
