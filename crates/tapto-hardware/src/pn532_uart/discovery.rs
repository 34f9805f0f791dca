//! Serial port discovery for PN532 UART readers.
//!
//! Candidates are probed in enumeration order with the full connect
//! handshake. A port that fails the handshake is added to the blocklist and
//! never probed again in this run.

use std::path::Path;

use tapto_core::DeviceSpec;
use tracing::{debug, error, trace, warn};

use super::blocklist::Blocklist;
use super::ports::PortFilter;
use super::{READER_ID, connect};
use crate::protocol::Pn532Backend;

/// Find the first working, unused PN532 on the host.
///
/// Blocking: runs handshakes against real ports.
pub(crate) fn detect(
    backend: &dyn Pn532Backend,
    filter: &PortFilter,
    blocklist: &Blocklist,
    connected: &[String],
) -> Option<String> {
    let ports = backend.ports().unwrap_or_else(|e| {
        error!(error = %e, "Failed to list serial ports");
        Vec::new()
    });

    for name in ports.iter().filter(|port| filter.matches(port)) {
        let device = DeviceSpec::new(READER_ID, name.as_str()).to_string();

        if blocklist.contains(name) {
            trace!(port = %name, "Skipping blocklisted port");
            continue;
        }

        if connected.contains(&device) {
            continue;
        }

        if resolves_to_connected(filter, name, connected) {
            debug!(port = %name, "Port resolves to a connected device, skipping");
            continue;
        }

        // same path already claimed by another reader variant
        let suffix = format!(":{name}");
        if connected.iter().any(|spec| spec.ends_with(&suffix)) {
            continue;
        }

        match connect(backend, name) {
            Ok(mut link) => {
                if let Err(e) = link.close() {
                    warn!(port = %name, error = %e, "Failed to close probed port");
                }
                debug!(device = %device, "Detected PN532 reader");
                return Some(device);
            }
            Err(e) => {
                debug!(port = %name, error = %e, "Failed to open detected port, blocklisting");
                blocklist.insert(name.as_str());
            }
        }
    }

    None
}

fn resolves_to_connected(filter: &PortFilter, name: &str, connected: &[String]) -> bool {
    let Some(real) = filter.resolve(name) else {
        return false;
    };

    connected
        .iter()
        .filter_map(|spec| DeviceSpec::parse(spec).ok())
        .any(|spec| {
            let path = spec.path();
            Path::new(path) == real || filter.resolve(path).is_some_and(|p| p == real)
        })
}
