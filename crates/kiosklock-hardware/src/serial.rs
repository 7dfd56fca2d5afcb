//! Serial port backend for the trigger line.
//!
//! The trigger board (an ESP32 or Arduino on a USB CDC port) prints a line
//! per pulse. The link is opened with a short read timeout so the polling
//! loop wakes regularly to check for shutdown and to flush partial lines.

use crate::error::{HardwareError, Result};
use crate::traits::{TriggerLink, TriggerPort};
use crate::types::PortInfo;
use kiosklock_core::constants::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS, DEFAULT_SERIAL_PORT};
use std::io::{ErrorKind, Read};
use std::time::Duration;
use tracing::debug;

/// Parameters of the serial trigger line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Port name (e.g. `COM5`, `/dev/ttyACM0`).
    pub port: String,

    /// Baud rate.
    pub baud_rate: u32,

    /// Upper bound on a single blocking read.
    pub read_timeout: Duration,
}

impl SerialConfig {
    /// Create a configuration for `port` with default line parameters.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    /// Set the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::ConfigurationError` if the port name is empty,
    /// the baud rate is zero, or the read timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(HardwareError::configuration("serial port name is empty"));
        }
        if self.baud_rate == 0 {
            return Err(HardwareError::configuration("baud rate must be non-zero"));
        }
        if self.read_timeout.is_zero() {
            return Err(HardwareError::configuration(
                "read timeout must be non-zero",
            ));
        }
        Ok(())
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
        }
    }
}

/// Serial port that can be (re)opened by the trigger channel.
#[derive(Debug, Clone)]
pub struct SerialTriggerPort {
    config: SerialConfig,
}

impl SerialTriggerPort {
    /// Create a port from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::ConfigurationError` if `config` is invalid.
    pub fn new(config: SerialConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The line parameters.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

impl TriggerPort for SerialTriggerPort {
    type Link = SerialLink;

    fn name(&self) -> &str {
        &self.config.port
    }

    fn open(&mut self) -> Result<SerialLink> {
        let port = serialport::new(&self.config.port, self.config.baud_rate)
            .timeout(self.config.read_timeout)
            .open()?;

        debug!(
            port = %self.config.port,
            baud_rate = self.config.baud_rate,
            "Serial port opened"
        );

        Ok(SerialLink {
            name: self.config.port.clone(),
            port,
        })
    }
}

/// Open serial connection. Closed on drop.
pub struct SerialLink {
    name: String,
    port: Box<dyn serialport::SerialPort>,
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink").field("name", &self.name).finish()
    }
}

impl TriggerLink for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.port.read(buf) {
            // The driver reports end of stream only when the device went away
            Ok(0) => Err(HardwareError::disconnected(&self.name)),
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

/// List serial ports present on this machine.
///
/// # Errors
///
/// Returns `HardwareError::Serial` if the platform enumeration fails.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(PortInfo::from)
        .collect())
}
