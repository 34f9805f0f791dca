//! Log subscriber bootstrap.

use tracing_subscriber::EnvFilter;

use crate::error::{DaemonError, Result};

/// Install the global fmt subscriber.
///
/// The filter comes from `RUST_LOG` when set, else from `default_directive`
/// (e.g. `"info"` or `"tapto_hardware=debug,info"`).
///
/// # Errors
///
/// Returns `DaemonError::Logging` if a global subscriber is already set or
/// the default directive does not parse.
pub fn init(default_directive: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)
            .map_err(|e| DaemonError::Logging(format!("bad filter {default_directive:?}: {e}")))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| DaemonError::Logging(e.to_string()))
}
