//! TapTo reader daemon core.
//!
//! Wires a token reader to the launcher: the [`ReaderManager`] keeps a
//! reader connected, de-duplicates its scans, forwards new tokens to the
//! launch queue and exits running software when its token is removed.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tapto_daemon::config::DaemonConfig;
//! use tapto_daemon::launch::launch_queue;
//! use tapto_daemon::manager::{ReaderManager, pn532_uart_factory};
//! use tapto_daemon::platform::Platform;
//! use tapto_daemon::state::DaemonState;
//! use tapto_hardware::pn532_uart::SerialBackend;
//! use tapto_hardware::protocol::Pn532Protocol;
//!
//! # async fn example(
//! #     platform: Arc<dyn Platform>,
//! #     protocol: Arc<dyn Pn532Protocol>,
//! # ) -> tapto_daemon::Result<()> {
//! tapto_daemon::logging::init("info")?;
//!
//! let config = DaemonConfig::load("/etc/tapto.toml")?;
//! let factory = pn532_uart_factory(Arc::new(SerialBackend::new(protocol)), &config);
//! let state = Arc::new(DaemonState::new());
//! let (launches, _rx) = launch_queue();
//!
//! let manager = ReaderManager::new(Arc::new(config), platform, state, launches, factory);
//! manager.run().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod exit;
pub mod launch;
pub mod logging;
pub mod manager;
pub mod platform;
pub mod state;

pub use config::DaemonConfig;
pub use error::{DaemonError, Result};
pub use manager::{ReaderFactory, ReaderManager};
pub use platform::Platform;
pub use state::DaemonState;
