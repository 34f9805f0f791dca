//! `serialport` backed transport for PN532 UART readers.

use std::sync::Arc;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPortBuilder, StopBits};
use tapto_core::constants::{SERIAL_BAUD_RATE, SERIAL_READ_TIMEOUT_MS};
use tracing::debug;

use crate::error::Result;
use crate::protocol::{Pn532Backend, Pn532Link, Pn532Protocol};

/// Serial port settings used for every PN532 UART connection: 115200 baud,
/// 8N1, no flow control, short read timeout.
pub fn port_settings(path: &str) -> SerialPortBuilder {
    serialport::new(path, SERIAL_BAUD_RATE)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(SERIAL_READ_TIMEOUT_MS))
}

/// Host serial ports driven by a PN532 command set.
#[derive(Clone)]
pub struct SerialBackend {
    protocol: Arc<dyn Pn532Protocol>,
}

impl SerialBackend {
    /// Create a backend issuing commands through `protocol`.
    pub fn new(protocol: Arc<dyn Pn532Protocol>) -> Self {
        Self { protocol }
    }
}

impl std::fmt::Debug for SerialBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialBackend").finish_non_exhaustive()
    }
}

impl Pn532Backend for SerialBackend {
    fn ports(&self) -> Result<Vec<String>> {
        let ports = serialport::available_ports()?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    fn open(&self, path: &str) -> Result<Box<dyn Pn532Link>> {
        debug!(port = %path, "Opening serial port");
        let port = port_settings(path).open()?;
        Ok(self.protocol.bind(port))
    }

    fn parse_text_record(&self, bytes: &[u8]) -> Result<String> {
        self.protocol.parse_text_record(bytes)
    }
}
