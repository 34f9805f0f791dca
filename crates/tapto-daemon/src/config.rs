//! Daemon configuration.
//!
//! Every field is optional in the TOML file. Key names used by older
//! configuration files (`exit_game`, `exit_game_delay`,
//! `exit_game_blocklist`) are accepted as aliases.
//!
//! ```toml
//! connection_string = "pn532_uart:/dev/ttyUSB0"
//! exit_on_removal = true
//! exit_delay_secs = 3
//! exit_blocklist = ["ao486", "PSX"]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tapto_core::constants::{
    DEFAULT_EXIT_DELAY_SECS, MAX_POLL_ERRORS, POLL_INTERVAL_MS, RECONNECT_INTERVAL_MS,
};
use tapto_hardware::pn532_uart::PollSettings;

use crate::error::{DaemonError, Result};

/// User configuration consumed by the reader manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Fixed device spec. Absent or empty means auto-detect.
    pub connection_string: Option<String>,

    /// Exit the running software when its token is removed.
    #[serde(alias = "exit_game")]
    pub exit_on_removal: bool,

    /// Grace period between removal and exit, in seconds.
    #[serde(alias = "exit_game_delay")]
    pub exit_delay_secs: u64,

    /// Launchers never exited on removal.
    #[serde(alias = "exit_game_blocklist")]
    pub exit_blocklist: Vec<String>,

    /// Delay between connection attempts, in milliseconds.
    pub reconnect_interval_ms: u64,

    /// Delay between two reader polls, in milliseconds.
    pub poll_interval_ms: u64,

    /// Consecutive reader errors before the driver disconnects itself.
    pub max_poll_errors: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            exit_on_removal: false,
            exit_delay_secs: DEFAULT_EXIT_DELAY_SECS,
            exit_blocklist: Vec::new(),
            reconnect_interval_ms: RECONNECT_INTERVAL_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
            max_poll_errors: MAX_POLL_ERRORS,
        }
    }
}

impl DaemonConfig {
    /// Parse a TOML document.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapto_daemon::config::DaemonConfig;
    ///
    /// let config = DaemonConfig::from_toml_str("exit_game = true").unwrap();
    /// assert!(config.exit_on_removal);
    /// assert_eq!(config.exit_delay_secs, 0);
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// holds out-of-range values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> Result<()> {
        if self.reconnect_interval_ms == 0 {
            return Err(DaemonError::Config(
                "reconnect_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(DaemonError::Config(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_poll_errors == 0 {
            return Err(DaemonError::Config(
                "max_poll_errors must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Configured device spec, `None` when auto-detecting.
    pub fn connection_string(&self) -> Option<&str> {
        self.connection_string
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Exit grace period.
    pub fn exit_delay(&self) -> Duration {
        Duration::from_secs(self.exit_delay_secs)
    }

    /// Delay between connection attempts.
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// Driver poll tuning.
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_errors: self.max_poll_errors,
        }
    }

    /// Check whether `launcher` is on the exit blocklist.
    pub fn is_exit_blocked(&self, launcher: &str) -> bool {
        self.exit_blocklist
            .iter()
            .any(|blocked| blocked.eq_ignore_ascii_case(launcher))
    }
}
