//! Serial driver for low-level hardware communication
//!
//! Provides async serial I/O with the valve microcontroller.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, warn};
use valve_core::{Result, ValveError};

/// Trait for serial transport abstraction
///
/// This trait enables testing of `DeviceSession` without real hardware
/// by allowing mock implementations.
#[async_trait]
pub trait SerialTransport: Send {
    /// Write one command line; the terminator is appended by the transport
    async fn write_line(&mut self, line: &str) -> Result<()>;

    /// Number of bytes waiting in the input buffer, without blocking
    fn bytes_to_read(&mut self) -> Result<usize>;

    /// Read whatever is currently buffered
    async fn read_available(&mut self) -> Result<Vec<u8>>;

    /// Check if the transport is still usable
    fn is_connected(&self) -> bool;

    /// Flush pending output before the handle is dropped
    async fn shutdown(&mut self) -> Result<()>;
}

/// Opens transports for a port name.
///
/// `DeviceSession` calls this on every reconnect, so the physical device may
/// come and go between calls.
pub trait SerialOpener: Send + Sync {
    fn open(&self, port: &str, baud_rate: u32) -> Result<Box<dyn SerialTransport>>;
}

/// Serial driver for hardware communication
pub struct SerialDriver {
    port: SerialStream,
    port_path: String,
    suffix: String,
    timeout_duration: Duration,
    connected: bool,
}

impl SerialDriver {
    /// Create a new serial driver
    ///
    /// # Arguments
    /// * `port_path` - Path to the serial device (e.g., "/dev/ttyACM0")
    /// * `baud_rate` - Line speed, 9600 for the stock firmware
    /// * `io_timeout` - Timeout for individual read/write operations
    pub fn new(port_path: &str, baud_rate: u32, io_timeout: Duration) -> Result<Self> {
        debug!("Opening serial port: {} at {} baud", port_path, baud_rate);

        let port = tokio_serial::new(port_path, baud_rate)
            .timeout(io_timeout)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| ValveError::Connect {
                port: port_path.to_string(),
                cause: e.to_string(),
            })?;

        debug!("Serial port opened successfully");

        Ok(Self {
            port,
            port_path: port_path.to_string(),
            suffix: "\n".to_string(),
            timeout_duration: io_timeout,
            connected: true,
        })
    }

    fn mark_disconnected(&mut self, reason: &str) {
        if self.connected {
            warn!("Serial port {} unusable: {}", self.port_path, reason);
        }
        self.connected = false;
    }
}

#[async_trait]
impl SerialTransport for SerialDriver {
    async fn write_line(&mut self, line: &str) -> Result<()> {
        let full_command = format!("{}{}", line, self.suffix);
        debug!("TX: {:?}", full_command);

        let written = timeout(
            self.timeout_duration,
            self.port.write_all(full_command.as_bytes()),
        )
        .await;

        match written {
            Err(_) => {
                error!("Write timeout");
                self.mark_disconnected("write timed out");
                return Err(ValveError::Timeout(
                    "Write operation timed out".to_string(),
                ));
            }
            Ok(Err(e)) => {
                error!("Write failed: {}", e);
                self.mark_disconnected("write failed");
                return Err(ValveError::Serial(format!("Write failed: {}", e)));
            }
            Ok(Ok(())) => {}
        }

        // Flush to ensure data is sent
        match timeout(self.timeout_duration, self.port.flush()).await {
            Err(_) => Err(ValveError::Timeout(
                "Flush operation timed out".to_string(),
            )),
            Ok(Err(e)) => {
                self.mark_disconnected("flush failed");
                Err(ValveError::Serial(format!("Flush failed: {}", e)))
            }
            Ok(Ok(())) => Ok(()),
        }
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        match SerialPort::bytes_to_read(&self.port) {
            Ok(count) => Ok(count as usize),
            Err(e) => {
                self.mark_disconnected("cannot query input buffer");
                Err(ValveError::Serial(format!(
                    "Failed to query input buffer: {}",
                    e
                )))
            }
        }
    }

    async fn read_available(&mut self) -> Result<Vec<u8>> {
        let pending = self.bytes_to_read()?.max(1);
        let mut buf = vec![0u8; pending];

        let read = timeout(self.timeout_duration, self.port.read(&mut buf)).await;

        match read {
            Err(_) => {
                error!("Read timeout");
                Err(ValveError::Timeout("Read operation timed out".to_string()))
            }
            Ok(Err(e)) => {
                error!("Read error: {}", e);
                self.mark_disconnected("read failed");
                Err(ValveError::Serial(format!("Read error: {}", e)))
            }
            Ok(Ok(0)) => {
                // EOF indicates device disconnection (USB unplugged, power loss, etc.)
                self.mark_disconnected("EOF");
                Err(ValveError::DeviceDisconnected(
                    "Serial port returned EOF - device may have been unplugged".to_string(),
                ))
            }
            Ok(Ok(n)) => {
                buf.truncate(n);
                debug!("RX: {} bytes", n);
                Ok(buf)
            }
        }
    }

    fn is_connected(&self) -> bool {
        // SerialStream has no "is open" query; failures seen during I/O clear the flag
        self.connected
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.connected = false;
        timeout(self.timeout_duration, self.port.flush())
            .await
            .map_err(|_| ValveError::Timeout("Flush operation timed out".to_string()))?
            .map_err(|e| ValveError::Serial(format!("Flush failed: {}", e)))
    }
}

/// Opens real serial ports through tokio-serial
#[derive(Debug, Clone)]
pub struct NativeOpener {
    io_timeout: Duration,
}

impl NativeOpener {
    pub fn new(io_timeout: Duration) -> Self {
        Self { io_timeout }
    }
}

impl SerialOpener for NativeOpener {
    fn open(&self, port: &str, baud_rate: u32) -> Result<Box<dyn SerialTransport>> {
        let driver = SerialDriver::new(port, baud_rate, self.io_timeout)?;
        Ok(Box::new(driver))
    }
}
