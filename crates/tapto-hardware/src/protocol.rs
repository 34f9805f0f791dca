//! PN532 hardware protocol seam.
//!
//! The byte-level PN532 command set (frame construction, checksums, NDEF
//! extraction) lives outside this crate. The driver only needs the handful
//! of operations below, issued against an already opened connection. Every
//! operation is blocking and may fail with a transport level error; the
//! driver treats all such failures alike.

use tapto_core::TokenType;

use crate::error::Result;

/// Firmware version reported by the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirmwareVersion {
    /// Chip variant, 0x32 for PN532.
    pub ic: u8,
    /// Firmware version.
    pub version: u8,
    /// Firmware revision.
    pub revision: u8,
    /// Supported card families bitmask.
    pub support: u8,
}

/// General status reported by the chip.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeneralStatus {
    /// Last error code, 0 when none.
    pub last_error: u8,
    /// External RF field detected.
    pub field_present: bool,
    /// Number of targets currently handled.
    pub targets: u8,
}

/// Passive target found in the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Tag family as declared by the target.
    pub kind: TokenType,
    /// Hex encoded UID.
    pub uid: String,
}

impl Target {
    /// Create a target descriptor.
    pub fn new(kind: TokenType, uid: impl Into<String>) -> Self {
        Self {
            kind,
            uid: uid.into(),
        }
    }
}

/// Raw payload read from a tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagData {
    /// Tag family the payload was read as.
    pub kind: TokenType,
    /// User memory bytes.
    pub bytes: Vec<u8>,
}

impl TagData {
    /// Hex encoding of the payload.
    pub fn hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// One open connection to a PN532 chip.
pub trait Pn532Link: Send {
    /// Put the secure access module in normal mode.
    fn sam_configuration(&mut self) -> Result<()>;

    /// Query the firmware version.
    fn firmware_version(&mut self) -> Result<FirmwareVersion>;

    /// Query the general status.
    fn general_status(&mut self) -> Result<GeneralStatus>;

    /// Look for one passive target, `None` when the field is empty.
    fn in_list_passive_target(&mut self) -> Result<Option<Target>>;

    /// Read the user memory of the NTAG currently in the field.
    fn read_ntag(&mut self) -> Result<TagData>;

    /// Release the underlying transport.
    fn close(&mut self) -> Result<()>;
}

/// PN532 command set bound to a serial transport.
pub trait Pn532Protocol: Send + Sync {
    /// Wrap an opened serial port into a link.
    fn bind(&self, port: Box<dyn serialport::SerialPort>) -> Box<dyn Pn532Link>;

    /// Extract the first text record from a raw NDEF payload.
    fn parse_text_record(&self, bytes: &[u8]) -> Result<String>;
}

/// Everything the PN532 driver needs from the outside world: port
/// enumeration, opening links and decoding payloads.
pub trait Pn532Backend: Send + Sync {
    /// List transport paths present on the host.
    fn ports(&self) -> Result<Vec<String>>;

    /// Open a link to the chip at `path`.
    fn open(&self, path: &str) -> Result<Box<dyn Pn532Link>>;

    /// Extract the first text record from a raw NDEF payload.
    fn parse_text_record(&self, bytes: &[u8]) -> Result<String>;
}
