//! Timing and sizing constants for the reader daemon.
//!
//! These values define how aggressively readers are polled, how long the
//! daemon waits between reconnection attempts and how the serial transport
//! is configured. Drivers take them as defaults; most can be overridden
//! through configuration.
//!
//! # Usage
//!
//! ```
//! use tapto_core::constants::*;
//! use std::time::Duration;
//!
//! let interval = Duration::from_millis(POLL_INTERVAL_MS);
//! assert_eq!(interval, Duration::from_millis(250));
//! assert_eq!(MAX_POLL_ERRORS, 5);
//! ```

// ============================================================================
// Device Specification
// ============================================================================

/// Separator between the reader variant id and the transport path.
///
/// ```
/// use tapto_core::constants::DEVICE_SPEC_SEPARATOR;
///
/// let spec = "pn532_uart:/dev/ttyUSB0";
/// assert_eq!(spec.split_once(DEVICE_SPEC_SEPARATOR), Some(("pn532_uart", "/dev/ttyUSB0")));
/// ```
pub const DEVICE_SPEC_SEPARATOR: char = ':';

// ============================================================================
// Serial Transport
// ============================================================================

/// Baud rate used for PN532 UART connections.
pub const SERIAL_BAUD_RATE: u32 = 115_200;

/// Read timeout applied to the serial transport in milliseconds.
///
/// Short enough to keep the poll loop responsive to shutdown without
/// busy-spinning on an idle port.
pub const SERIAL_READ_TIMEOUT_MS: u64 = 100;

// ============================================================================
// Polling
// ============================================================================

/// Delay between two passive-target polls in milliseconds.
pub const POLL_INTERVAL_MS: u64 = 250;

/// Consecutive protocol errors after which a driver disconnects itself.
pub const MAX_POLL_ERRORS: u32 = 5;

/// Capacity of the scan queue between a driver and the reader manager.
///
/// Kept at one so a driver waits for the manager instead of piling up
/// stale scans.
pub const SCAN_QUEUE_CAPACITY: usize = 1;

// ============================================================================
// Reader Manager
// ============================================================================

/// Delay between connection attempts made by the supervisor in milliseconds.
pub const RECONNECT_INTERVAL_MS: u64 = 1_000;

/// Minimum time between two audible failure cues in milliseconds.
pub const FAIL_SOUND_COOLDOWN_MS: u64 = 1_000;

/// Default delay before exiting the launcher after token removal, in seconds.
pub const DEFAULT_EXIT_DELAY_SECS: u64 = 0;
