//! EW-1 logger service
//!
//! Polls the configured EW-1 registers on an interval and appends one row
//! per cycle to Google Sheets or a local CSV file.

pub mod config;
pub mod csv_sink;
pub mod cycle;
pub mod error;
pub mod sheets;
pub mod sink;

pub use config::{DeviceConfig, LoggerConfig, SheetsConfig};
pub use csv_sink::CsvSink;
pub use cycle::{log_once, read_cycle, run_every, Connector};
pub use error::{ConfigError, SinkError};
pub use sheets::SheetsSink;
pub use sink::{format_row, header_row, RowSink};
