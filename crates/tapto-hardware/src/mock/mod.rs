//! Mock implementations for testing and development.
//!
//! [`MockReader`] stands in for a whole reader variant and is what the daemon
//! tests run against. [`MockBackend`] sits one layer lower and scripts the
//! PN532 chip so the real UART driver can be exercised without hardware.

pub mod pn532;
pub mod reader;

pub use pn532::{LinkScript, MockBackend, PollStep};
pub use reader::{MOCK_READER_ID, MockReader, MockReaderHandle};
