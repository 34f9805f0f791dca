//! Exit on removal.
//!
//! When a token is removed the manager may arm an [`ExitTimer`]. If the
//! timer fires while a launcher is still running, the launcher is killed and
//! a `None` software notification is fed back into the manager loop. The
//! timer never touches manager state directly.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::DaemonConfig;
use crate::launch::SoftwareNotifier;
use crate::platform::Platform;
use crate::state::DaemonState;

/// Decide whether removing the current token should exit the launcher.
pub fn should_exit(config: &DaemonConfig, platform: &dyn Platform, state: &DaemonState) -> bool {
    if !config.exit_on_removal {
        return false;
    }

    // nowhere to exit to from the menu
    let Some(launcher) = platform.active_launcher().filter(|l| !l.is_empty()) else {
        return false;
    };

    if state.last_scanned().is_some_and(|t| t.from_api) || state.is_launcher_disabled() {
        return false;
    }

    if config.is_exit_blocked(&launcher) {
        debug!(launcher = %launcher, "Launcher is on the exit blocklist");
        return false;
    }

    true
}

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// Cancellable delayed launcher exit.
///
/// Runs as its own task. [`stop`](ExitTimer::stop) only succeeds while the
/// timer is still pending, so a timer that already fired, or was already
/// stopped, reports `false`.
#[derive(Debug)]
pub struct ExitTimer {
    state: Arc<AtomicU8>,
    task: JoinHandle<()>,
}

impl ExitTimer {
    /// Arm a timer firing after `delay`.
    pub fn start(
        delay: Duration,
        platform: Arc<dyn Platform>,
        software: SoftwareNotifier,
    ) -> Self {
        let state = Arc::new(AtomicU8::new(PENDING));
        let task = tokio::spawn({
            let state = Arc::clone(&state);
            async move {
                tokio::time::sleep(delay).await;
                if state
                    .compare_exchange(PENDING, FIRED, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    fire(platform.as_ref(), &software);
                }
            }
        });

        Self { state, task }
    }

    /// Cancel the timer. Returns `true` if it was pending.
    pub fn stop(&self) -> bool {
        let stopped = self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if stopped {
            self.task.abort();
        }
        stopped
    }

    /// Check whether the timer has neither fired nor been stopped.
    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::SeqCst) == PENDING
    }
}

fn fire(platform: &dyn Platform, software: &SoftwareNotifier) {
    if platform.active_launcher().is_none_or(|l| l.is_empty()) {
        debug!("No active launcher, not exiting");
        return;
    }

    info!("Exiting software");
    if let Err(e) = platform.kill_launcher() {
        warn!(error = %e, "Error killing launcher");
    }

    software.exited();
}
