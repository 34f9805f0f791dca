//! Process wide daemon state.
//!
//! One [`DaemonState`] is created at startup and shared by reference
//! (`Arc`) with every component. The reader slot sits behind an async mutex
//! so the supervisor can replace a reader atomically; the token records sit
//! behind short-lived locks; flags are atomics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tapto_core::Token;
use tapto_hardware::{AnyReader, Reader};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Shared daemon state.
///
/// # Examples
///
/// ```
/// use tapto_daemon::state::DaemonState;
///
/// let state = DaemonState::new();
/// assert!(!state.should_stop());
///
/// state.stop_service();
/// assert!(state.should_stop());
/// ```
#[derive(Debug, Default)]
pub struct DaemonState {
    reader: Mutex<Option<AnyReader>>,
    active_card: RwLock<Option<Token>>,
    last_scanned: RwLock<Option<Token>>,
    launcher_disabled: AtomicBool,
    shutdown: CancellationToken,
}

impl DaemonState {
    /// Create empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `reader`, returning the previous one.
    pub async fn set_reader(&self, reader: AnyReader) -> Option<AnyReader> {
        self.reader.lock().await.replace(reader)
    }

    /// Remove and return the current reader.
    pub async fn take_reader(&self) -> Option<AnyReader> {
        self.reader.lock().await.take()
    }

    /// Check whether a reader is stored and connected.
    pub async fn reader_connected(&self) -> bool {
        self.reader
            .lock()
            .await
            .as_ref()
            .is_some_and(|reader| reader.connected())
    }

    /// Device spec of the connected reader.
    pub async fn reader_device(&self) -> Option<String> {
        self.reader
            .lock()
            .await
            .as_ref()
            .filter(|reader| reader.connected())
            .map(|reader| reader.device().to_string())
    }

    /// Token currently on the reader.
    pub fn active_card(&self) -> Option<Token> {
        read(&self.active_card).clone()
    }

    pub fn set_active_card(&self, token: Option<Token>) {
        *write(&self.active_card) = token;
    }

    /// Last token accepted for launch, physical or injected.
    pub fn last_scanned(&self) -> Option<Token> {
        read(&self.last_scanned).clone()
    }

    pub fn set_last_scanned(&self, token: Option<Token>) {
        *write(&self.last_scanned) = token;
    }

    /// Launching is disabled by the host.
    pub fn is_launcher_disabled(&self) -> bool {
        self.launcher_disabled.load(Ordering::SeqCst)
    }

    pub fn set_launcher_disabled(&self, disabled: bool) {
        self.launcher_disabled.store(disabled, Ordering::SeqCst);
    }

    /// Check whether shutdown was requested.
    pub fn should_stop(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Request shutdown of every daemon loop.
    pub fn stop_service(&self) {
        self.shutdown.cancel();
    }

    /// Resolve once shutdown is requested.
    pub async fn stopped(&self) {
        self.shutdown.cancelled().await
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
