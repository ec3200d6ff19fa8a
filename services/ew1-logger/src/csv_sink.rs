//! Local CSV output

use async_trait::async_trait;
use chrono::NaiveDateTime;
use ew1_registers::PollSnapshot;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::SinkError;
use crate::sink::{format_row, header_row, resolve_columns, RowSink};

/// Appends rows to a CSV file, writing the header into new or empty files
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows currently in the file, header included
    fn row_count(&self) -> Result<usize, SinkError> {
        if !self.path.exists() {
            return Ok(0);
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;
        let mut count = 0;
        for record in reader.records() {
            record?;
            count += 1;
        }
        Ok(count)
    }

    fn append_record(&self, record: &[String]) -> Result<(), SinkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(file);
        writer.write_record(record)?;
        writer.flush()?;
        Ok(())
    }
}

#[async_trait]
impl RowSink for CsvSink {
    async fn setup_header(&mut self, columns: &[String]) -> Result<(), SinkError> {
        if self.row_count()? == 0 {
            self.append_record(&header_row(columns))?;
            info!("Header written to {}", self.path.display());
        } else {
            debug!("{} already has rows, header left as is", self.path.display());
        }
        Ok(())
    }

    async fn append_row(
        &mut self,
        timestamp: NaiveDateTime,
        snapshot: &PollSnapshot,
        columns: &[String],
    ) -> Result<usize, SinkError> {
        let mut rows = self.row_count()?;
        if rows == 0 {
            self.append_record(&header_row(&resolve_columns(snapshot, columns)))?;
            rows = 1;
        }
        self.append_record(&format_row(timestamp, snapshot, columns))?;
        Ok(rows + 1)
    }
}
