// ABOUTME: Byte-stream transport seam for the AT session engine, with a tokio-serial implementation
// ABOUTME: Provides line-oriented reads with per-call timeouts that surface partially received data

use async_trait::async_trait;
use bytes::BytesMut;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// Errors raised by the byte-stream transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The port could not be opened (or no port was configured).
    #[error("failed to open port: {0}")]
    Connect(String),

    /// I/O failure on an established connection.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A read hit its deadline. `pending` carries whatever arrived before the
    /// timeout; the SMS prompt protocol inspects it, since the `> ` prompt is
    /// never terminated by a newline.
    #[error("read timed out with {} byte(s) pending", pending.len())]
    Timeout { pending: String },

    /// The peer closed the stream.
    #[error("transport closed")]
    Closed,
}

/// Serial connection parameters.
///
/// `port` is optional so that a session can be constructed around an
/// externally supplied [`Transport`] (useful for tests and custom wiring)
/// without inventing a placeholder device path.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub port: Option<String>,
    /// Baud rate. GSM modems almost universally speak 115200 or 9600.
    pub baud_rate: u32,
    /// Default deadline for a single line read.
    pub read_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            port: None,
            baud_rate: 115_200,
            read_timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    pub fn new(port: impl Into<String>) -> Self {
        TransportConfig {
            port: Some(port.into()),
            ..Default::default()
        }
    }
}

/// Raw byte-stream transport under the session.
///
/// The contract is deliberately small: write bytes, read one line, close.
/// No AT parsing happens at this layer. `read_line` must return
/// [`TransportError::Timeout`] with the partial data when the terminator is
/// not seen in time, and [`TransportError::Closed`] when the stream ends.
#[async_trait]
pub trait Transport: Send {
    /// Write all of `bytes` to the stream.
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Read until `read_term` is seen, returning the line including the
    /// terminator. The timeout applies between chunks of received data, in
    /// the manner of a serial inter-character timeout.
    async fn read_line(&mut self, read_term: &str, timeout: Duration)
    -> Result<String, TransportError>;

    /// Close the underlying stream.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// [`Transport`] implementation over a local serial port.
pub struct SerialTransport {
    stream: SerialStream,
    // Carry-over buffer for bytes read past a line terminator.
    buffer: BytesMut,
}

impl SerialTransport {
    /// Open the serial port described by `config`.
    pub fn open(config: &TransportConfig) -> Result<Self, TransportError> {
        let port = config
            .port
            .as_deref()
            .ok_or_else(|| TransportError::Connect("no port configured".to_string()))?;

        let stream = tokio_serial::new(port, config.baud_rate)
            .open_native_async()
            .map_err(|e| TransportError::Connect(format!("{port}: {e}")))?;

        tracing::debug!(port, baud = config.baud_rate, "serial port opened");

        Ok(SerialTransport {
            stream,
            buffer: BytesMut::with_capacity(4 * 1024),
        })
    }

    /// Take and return everything currently buffered, as a lossy string.
    fn drain_pending(&mut self) -> String {
        let pending = self.buffer.split();
        String::from_utf8_lossy(&pending).into_owned()
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        tracing::trace!(data = ?String::from_utf8_lossy(bytes), "write");
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_line(
        &mut self,
        read_term: &str,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        let term = read_term.as_bytes();

        loop {
            // Return a buffered line if a terminator is already present.
            if let Some(pos) = self
                .buffer
                .windows(term.len())
                .position(|window| window == term)
            {
                let line = self.buffer.split_to(pos + term.len());
                let line = String::from_utf8_lossy(&line).into_owned();
                tracing::trace!(data = ?line, "read");
                return Ok(line);
            }

            match tokio::time::timeout(timeout, self.stream.read_buf(&mut self.buffer)).await {
                Ok(Ok(0)) => return Err(TransportError::Closed),
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => return Err(TransportError::Io(e)),
                Err(_) => {
                    return Err(TransportError::Timeout {
                        pending: self.drain_pending(),
                    });
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
