//! Host specific serial port naming rules.
//!
//! Discovery only probes ports that look like a USB serial adapter on the
//! host OS, and `open` only checks for the device node where ports are real
//! filesystem entries.

use std::path::PathBuf;

/// Naming rules for serial ports on one platform.
///
/// # Examples
///
/// ```
/// use tapto_hardware::pn532_uart::PortFilter;
///
/// let linux = PortFilter::linux();
/// assert!(linux.matches("/dev/ttyUSB0"));
/// assert!(!linux.matches("/dev/ttyS0"));
///
/// let windows = PortFilter::windows();
/// assert!(windows.matches("COM3"));
/// assert!(!windows.has_device_nodes());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortFilter {
    prefixes: Vec<String>,
    device_nodes: bool,
}

impl PortFilter {
    /// Windows virtual COM ports.
    pub fn windows() -> Self {
        Self {
            prefixes: vec!["COM".to_string()],
            device_nodes: false,
        }
    }

    /// macOS callout devices.
    pub fn macos() -> Self {
        Self {
            prefixes: vec!["/dev/tty.".to_string()],
            device_nodes: true,
        }
    }

    /// Linux and other Unix USB serial adapters.
    pub fn linux() -> Self {
        Self {
            prefixes: vec!["/dev/ttyUSB".to_string(), "/dev/ttyACM".to_string()],
            device_nodes: true,
        }
    }

    /// Rules for the platform this binary was built for.
    pub fn host() -> Self {
        if cfg!(target_os = "windows") {
            Self::windows()
        } else if cfg!(target_os = "macos") {
            Self::macos()
        } else {
            Self::linux()
        }
    }

    /// Filesystem based rules with custom prefixes.
    pub fn with_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
            device_nodes: true,
        }
    }

    /// Check whether `port` looks like a candidate reader.
    pub fn matches(&self, port: &str) -> bool {
        self.prefixes.iter().any(|prefix| port.starts_with(prefix))
    }

    /// Ports are filesystem entries that can be stat'ed and may be symlinks.
    pub fn has_device_nodes(&self) -> bool {
        self.device_nodes
    }

    /// Resolve a port path through symlinks, when the platform has any.
    pub fn resolve(&self, port: &str) -> Option<PathBuf> {
        if !self.device_nodes {
            return None;
        }
        std::fs::canonicalize(port).ok()
    }
}

impl Default for PortFilter {
    fn default() -> Self {
        Self::host()
    }
}
