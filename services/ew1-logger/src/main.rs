//! EW-1 logger
//!
//! Reads the EW-1 over Modbus TCP and appends the values to Google Sheets
//! (or a CSV file), once or on an interval.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

use common::logging;
use common::shutdown::wait_for_shutdown;
use ew1_logger::cycle::{log_values, read_cycle};
use ew1_logger::{log_once, run_every, ConfigError, CsvSink, LoggerConfig, RowSink, SheetsSink};

#[derive(Parser, Debug)]
#[command(name = "ew1-logger")]
#[command(about = "Log ERAB EW-1 data to Google Sheets")]
#[command(after_help = "Examples:
  ew1-logger                           Run once with registers.json
  ew1-logger --interval 300            Log every 5 minutes
  ew1-logger --config my_config.json   Use another configuration
  ew1-logger --dry-run                 Test the EW-1 connection only
  ew1-logger --csv ew1.csv             Write to a local CSV file")]
struct Args {
    /// Configuration file (JSON, YAML or TOML)
    #[arg(long, default_value = "registers.json")]
    config: PathBuf,

    /// Logging interval in seconds (0 = run once)
    #[arg(long, default_value_t = 0)]
    interval: u64,

    /// Only read from the EW-1, write nothing
    #[arg(long)]
    dry_run: bool,

    /// Write the header row before logging
    #[arg(long)]
    setup_header: bool,

    /// Append to this CSV file instead of Google Sheets
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let loaded = LoggerConfig::load(&args.config);

    let mut log_config = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    log_config.service_name = "ew1-logger".to_string();
    if args.verbose {
        log_config.level = "debug".to_string();
    }
    logging::init_with_config(&log_config).context("Failed to initialize logging")?;

    let config = match loaded {
        Ok(config) => config,
        Err(ConfigError::NotFound(path)) => {
            error!("Configuration file not found: {}", path.display());
            error!("Scan the EW-1 first (ew1-scan <EW1_IP>) and put the discovered registers in the file");
            return Ok(ExitCode::FAILURE);
        },
        Err(e) => return Err(e).context(format!("Failed to load {}", args.config.display())),
    };

    info!("Loaded configuration from {}", args.config.display());
    config.log_warnings();
    let settings = config.ew1.tcp_settings()?;
    info!("EW-1 address: {}", settings.endpoint());
    let columns = config.columns();

    if args.dry_run {
        info!("Dry run: reading from EW-1 only");
        return match read_cycle(&settings, &config.registers).await {
            Ok(snapshot) => {
                log_values(&snapshot, &config.registers);
                Ok(ExitCode::SUCCESS)
            },
            Err(e) => {
                error!("Connection failed: {}", e);
                Ok(ExitCode::FAILURE)
            },
        };
    }

    let mut sink: Box<dyn RowSink> = match &args.csv {
        Some(path) => {
            info!("Writing to {}", path.display());
            Box::new(CsvSink::new(path))
        },
        None => {
            let sheets = SheetsSink::from_config(&config.sheets)
                .context("Failed to set up Google Sheets")?;
            info!(
                "Writing to spreadsheet {} ({})",
                sheets.spreadsheet_id(),
                sheets.worksheet()
            );
            Box::new(sheets)
        },
    };

    if args.setup_header {
        info!("Setting up header row");
        sink.setup_header(&columns)
            .await
            .context("Failed to set up header row")?;
    }

    if args.interval > 0 {
        run_every(
            &settings,
            sink.as_mut(),
            &config.registers,
            &columns,
            Duration::from_secs(args.interval),
            async {
                wait_for_shutdown().await;
                info!("Shutdown requested");
            },
        )
        .await;
        Ok(ExitCode::SUCCESS)
    } else if log_once(&settings, sink.as_mut(), &config.registers, &columns).await {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["ew1-logger"]);
        assert_eq!(args.config, PathBuf::from("registers.json"));
        assert_eq!(args.interval, 0);
        assert!(!args.dry_run);
        assert!(args.csv.is_none());
    }
}
