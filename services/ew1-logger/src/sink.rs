//! Row output
//!
//! One row per cycle: timestamp first, then one cell per column.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use ew1_registers::PollSnapshot;

use crate::error::SinkError;

pub const TIMESTAMP_HEADER: &str = "Timestamp";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Destination for logged rows
#[async_trait]
pub trait RowSink: Send {
    /// Make sure the first row is `Timestamp` followed by `columns`
    async fn setup_header(&mut self, columns: &[String]) -> Result<(), SinkError>;

    /// Append one row and return its 1-based row number
    async fn append_row(
        &mut self,
        timestamp: NaiveDateTime,
        snapshot: &PollSnapshot,
        columns: &[String],
    ) -> Result<usize, SinkError>;
}

pub fn header_row(columns: &[String]) -> Vec<String> {
    std::iter::once(TIMESTAMP_HEADER.to_string())
        .chain(columns.iter().cloned())
        .collect()
}

/// Columns to write: `columns` as given, or the snapshot's names sorted
pub fn resolve_columns(snapshot: &PollSnapshot, columns: &[String]) -> Vec<String> {
    if columns.is_empty() {
        let mut names: Vec<String> = snapshot.names().into_iter().map(String::from).collect();
        names.sort();
        names
    } else {
        columns.to_vec()
    }
}

/// Timestamp cell followed by two-decimal values; missing or unreadable
/// values are empty cells
pub fn format_row(
    timestamp: NaiveDateTime,
    snapshot: &PollSnapshot,
    columns: &[String],
) -> Vec<String> {
    let mut row = Vec::with_capacity(columns.len() + 1);
    row.push(timestamp.format(TIMESTAMP_FORMAT).to_string());
    for column in resolve_columns(snapshot, columns) {
        row.push(
            snapshot
                .get(&column)
                .map(|value| format!("{value:.2}"))
                .unwrap_or_default(),
        );
    }
    row
}
