//! Enum wrapper for reader dispatch.
//!
//! Native `async fn` in traits is not object-safe, so `Box<dyn Reader>` is
//! not an option. [`AnyReader`] gives the reader manager one concrete type
//! that covers every reader variant the daemon knows about.
//!
//! # Examples
//!
//! ```
//! use tapto_hardware::devices::AnyReader;
//! use tapto_hardware::mock::MockReader;
//! use tapto_hardware::traits::Reader;
//!
//! let (reader, _handle) = MockReader::new();
//! let reader = AnyReader::from(reader);
//! assert_eq!(reader.ids(), &["mock"]);
//! ```

use tapto_core::{Scan, Token};
use tokio::sync::mpsc;

use crate::Result;
use crate::mock::MockReader;
use crate::pn532_uart::Pn532UartReader;
use crate::traits::Reader;

/// Any supported reader variant.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyReader {
    /// PN532 over a UART serial port.
    Pn532Uart(Pn532UartReader),
    /// Mock reader for development and testing.
    Mock(MockReader),
}

impl From<Pn532UartReader> for AnyReader {
    fn from(reader: Pn532UartReader) -> Self {
        Self::Pn532Uart(reader)
    }
}

impl From<MockReader> for AnyReader {
    fn from(reader: MockReader) -> Self {
        Self::Mock(reader)
    }
}

impl Reader for AnyReader {
    fn ids(&self) -> &'static [&'static str] {
        match self {
            Self::Pn532Uart(reader) => reader.ids(),
            Self::Mock(reader) => reader.ids(),
        }
    }

    async fn open(&mut self, device: &str, scans: mpsc::Sender<Scan>) -> Result<()> {
        match self {
            Self::Pn532Uart(reader) => reader.open(device, scans).await,
            Self::Mock(reader) => reader.open(device, scans).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Pn532Uart(reader) => reader.close().await,
            Self::Mock(reader) => reader.close().await,
        }
    }

    fn connected(&self) -> bool {
        match self {
            Self::Pn532Uart(reader) => reader.connected(),
            Self::Mock(reader) => reader.connected(),
        }
    }

    async fn detect(&self, connected: &[String]) -> Option<String> {
        match self {
            Self::Pn532Uart(reader) => reader.detect(connected).await,
            Self::Mock(reader) => reader.detect(connected).await,
        }
    }

    fn device(&self) -> &str {
        match self {
            Self::Pn532Uart(reader) => reader.device(),
            Self::Mock(reader) => reader.device(),
        }
    }

    fn info(&self) -> String {
        match self {
            Self::Pn532Uart(reader) => reader.info(),
            Self::Mock(reader) => reader.info(),
        }
    }

    async fn write(&mut self, text: &str) -> Result<Token> {
        match self {
            Self::Pn532Uart(reader) => reader.write(text).await,
            Self::Mock(reader) => reader.write(text).await,
        }
    }
}
