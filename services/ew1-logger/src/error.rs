//! Logger service errors

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Invalid(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sheets request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sheets API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid spreadsheet: {0}")]
    InvalidSpreadsheet(String),

    #[error("No Sheets access token configured (set sheets.token or EW1_SHEETS_TOKEN)")]
    MissingToken,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
