//! Modbus TCP reader
//!
//! [`RegisterReader`] over a `tokio-modbus` client context. Every request is
//! bounded by the configured timeout; exceptions, transport errors and
//! timeouts all surface as [`ReadError`].

use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::lookup_host;
use tokio::time::error::Elapsed;
use tokio::time::timeout;
use tokio_modbus::client::{tcp, Context};
use tokio_modbus::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{ReadError, Result};
use crate::reader::RegisterReader;

pub const DEFAULT_PORT: u16 = 502;
pub const DEFAULT_UNIT_ID: u8 = 1;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for one Modbus TCP device
#[derive(Debug, Clone, PartialEq)]
pub struct TcpSettings {
    pub host: String,
    pub port: u16,
    pub unit_id: u8,
    pub timeout: Duration,
}

impl TcpSettings {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            unit_id: DEFAULT_UNIT_ID,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Connection to one Modbus TCP device
///
/// A request that times out or breaks the transport drops the connection;
/// the next request reconnects so a late reply is never read as the answer
/// to a newer request.
pub struct ModbusTcpReader {
    ctx: Option<Context>,
    addr: SocketAddr,
    slave: Slave,
    endpoint: String,
    timeout: Duration,
}

impl std::fmt::Debug for ModbusTcpReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusTcpReader")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.ctx.is_some())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ModbusTcpReader {
    /// Resolve the host and open a connection bound to `settings.unit_id`
    pub async fn connect(settings: &TcpSettings) -> Result<Self> {
        let endpoint = settings.endpoint();
        let addr: SocketAddr = lookup_host(endpoint.as_str())
            .await
            .map_err(|e| connection_failed(&endpoint, e.to_string()))?
            .next()
            .ok_or_else(|| connection_failed(&endpoint, "host did not resolve".to_string()))?;

        let mut reader = Self {
            ctx: None,
            addr,
            slave: Slave(settings.unit_id),
            endpoint,
            timeout: settings.timeout,
        };
        reader.context().await?;
        info!("Connected to {} (unit {})", reader.endpoint, settings.unit_id);
        Ok(reader)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Close the connection; errors are logged, not returned
    pub async fn disconnect(mut self) {
        let Some(mut ctx) = self.ctx.take() else {
            return;
        };
        if let Err(e) = ctx.disconnect().await {
            warn!("Disconnect from {} failed: {}", self.endpoint, e);
        } else {
            debug!("Disconnected from {}", self.endpoint);
        }
    }

    /// The open context, reconnecting first if the last request dropped it
    async fn context(&mut self) -> Result<&mut Context> {
        let ctx = match self.ctx.take() {
            Some(ctx) => ctx,
            None => {
                debug!("Connecting to {} (unit {})", self.addr, self.slave.0);
                timeout(self.timeout, tcp::connect_slave(self.addr, self.slave))
                    .await
                    .map_err(|_| {
                        connection_failed(
                            &self.endpoint,
                            format!("timed out after {:?}", self.timeout),
                        )
                    })?
                    .map_err(|e| connection_failed(&self.endpoint, e.to_string()))?
            },
        };
        Ok(self.ctx.insert(ctx))
    }

    /// Map a request outcome, dropping the connection when its stream can no
    /// longer be trusted
    fn finish<T>(
        &mut self,
        address: u16,
        response: std::result::Result<tokio_modbus::Result<T>, Elapsed>,
    ) -> Result<T> {
        let result = match response {
            Ok(response) => flatten(address, response),
            Err(_) => Err(ReadError::Timeout { address }),
        };
        if matches!(
            result,
            Err(ReadError::Timeout { .. } | ReadError::Transport(_))
        ) {
            warn!(
                "Dropping connection to {} after failed request at {}",
                self.endpoint, address
            );
            self.ctx = None;
        }
        result
    }
}

fn connection_failed(endpoint: &str, reason: String) -> ReadError {
    ReadError::ConnectionFailed {
        endpoint: endpoint.to_string(),
        reason,
    }
}

/// Flatten tokio-modbus' transport/exception result layers
fn flatten<T>(address: u16, response: tokio_modbus::Result<T>) -> Result<T> {
    match response {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(code)) => Err(ReadError::Exception {
            address,
            message: format!("{code:?}"),
        }),
        Err(e) => Err(ReadError::Transport(e.to_string())),
    }
}

fn first_bit(address: u16, bits: Vec<bool>) -> Result<bool> {
    bits.first().copied().ok_or(ReadError::ShortResponse {
        address,
        expected: 1,
        actual: 0,
    })
}

#[async_trait]
impl RegisterReader for ModbusTcpReader {
    async fn read_holding(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        let limit = self.timeout;
        let ctx = self.context().await?;
        let response = timeout(limit, ctx.read_holding_registers(address, count)).await;
        self.finish(address, response)
    }

    async fn read_input(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        let limit = self.timeout;
        let ctx = self.context().await?;
        let response = timeout(limit, ctx.read_input_registers(address, count)).await;
        self.finish(address, response)
    }

    async fn read_coil(&mut self, address: u16) -> Result<bool> {
        let limit = self.timeout;
        let ctx = self.context().await?;
        let response = timeout(limit, ctx.read_coils(address, 1)).await;
        first_bit(address, self.finish(address, response)?)
    }

    async fn read_discrete(&mut self, address: u16) -> Result<bool> {
        let limit = self.timeout;
        let ctx = self.context().await?;
        let response = timeout(limit, ctx.read_discrete_inputs(address, 1)).await;
        first_bit(address, self.finish(address, response)?)
    }
}
