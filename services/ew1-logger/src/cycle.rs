//! Logging cycle
//!
//! A cycle opens a fresh device connection, reads every configured register,
//! logs the values and appends one row. Failures are logged and reported as
//! `false`; the service keeps running.

use async_trait::async_trait;
use chrono::Local;
use ew1_registers::{
    read_all, MemoryDevice, ModbusTcpReader, PollSnapshot, ReadError, RegisterDefinition,
    RegisterReader, TcpSettings,
};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::sink::RowSink;

/// Opens a reader for one cycle
#[async_trait]
pub trait Connector: Send + Sync {
    type Reader: RegisterReader;

    async fn connect(&self) -> Result<Self::Reader, ReadError>;

    /// Release the reader after the cycle
    async fn release(&self, reader: Self::Reader) {
        drop(reader);
    }
}

#[async_trait]
impl Connector for TcpSettings {
    type Reader = ModbusTcpReader;

    async fn connect(&self) -> Result<ModbusTcpReader, ReadError> {
        ModbusTcpReader::connect(self).await
    }

    async fn release(&self, reader: ModbusTcpReader) {
        reader.disconnect().await;
    }
}

/// Every cycle reads the same simulated device
#[async_trait]
impl Connector for MemoryDevice {
    type Reader = MemoryDevice;

    async fn connect(&self) -> Result<MemoryDevice, ReadError> {
        Ok(self.clone())
    }
}

/// Connect, read all registers and release the connection
pub async fn read_cycle<C>(
    connector: &C,
    registers: &[RegisterDefinition],
) -> Result<PollSnapshot, ReadError>
where
    C: Connector + ?Sized,
{
    let mut reader = connector.connect().await?;
    let snapshot = read_all(&mut reader, registers).await;
    connector.release(reader).await;
    Ok(snapshot)
}

/// Log each value with its unit
pub fn log_values(snapshot: &PollSnapshot, registers: &[RegisterDefinition]) {
    for (name, value) in snapshot.iter() {
        let unit = registers
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.unit.as_str())
            .unwrap_or("");
        match value {
            Some(value) => info!("  {}: {:.2} {}", name, value, unit),
            None => warn!("  {}: <read failed>", name),
        }
    }
}

/// Run one cycle; `true` when a row was written
pub async fn log_once<C, S>(
    connector: &C,
    sink: &mut S,
    registers: &[RegisterDefinition],
    columns: &[String],
) -> bool
where
    C: Connector + ?Sized,
    S: RowSink + ?Sized,
{
    let timestamp = Local::now().naive_local();

    info!("Reading from EW-1");
    let snapshot = match read_cycle(connector, registers).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("EW-1 connection error: {}", e);
            return false;
        },
    };

    info!("Got {}/{} values", snapshot.successful(), snapshot.len());
    log_values(&snapshot, registers);

    match sink.append_row(timestamp, &snapshot, columns).await {
        Ok(row) => {
            info!("Row {} written", row);
            true
        },
        Err(e) => {
            error!("Failed to write row: {}", e);
            false
        },
    }
}

/// Run cycles every `interval` until `shutdown` completes.
///
/// Shutdown is checked between cycles; a running cycle always finishes.
/// Returns the number of cycles run.
pub async fn run_every<C, S, F>(
    connector: &C,
    sink: &mut S,
    registers: &[RegisterDefinition],
    columns: &[String],
    interval: Duration,
    shutdown: F,
) -> usize
where
    C: Connector + ?Sized,
    S: RowSink + ?Sized,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    info!("Starting continuous logging (interval: {:?})", interval);

    let mut cycles = 0;
    loop {
        if !log_once(connector, sink, registers, columns).await {
            warn!("Cycle {} failed, retrying next interval", cycles + 1);
        }
        cycles += 1;

        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(interval) => {},
        }
    }

    info!("Logger stopped after {} cycles", cycles);
    cycles
}
