//! Reader capability trait.
//!
//! This module defines the contract every physical token reader satisfies,
//! whatever its transport. The reader manager only talks to readers through
//! this trait, so new reader variants plug in without touching the daemon.
//!
//! All async methods use native `async fn` in traits (Rust 1.90 + Edition
//! 2024 RPITIT), eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use tapto_core::{Scan, Token};
use tokio::sync::mpsc;

use crate::error::Result;

/// Physical token reader.
///
/// A reader is created disconnected. [`open`](Reader::open) connects it to a
/// device and starts feeding [`Scan`] values into the given queue until
/// [`close`](Reader::close) is called or the driver gives up on the device.
///
/// # Object Safety and Dynamic Dispatch
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. For dynamic dispatch use the enum wrapper
/// [`AnyReader`](crate::devices::AnyReader).
///
/// # Examples
///
/// ```no_run
/// use tapto_hardware::traits::Reader;
/// use tapto_hardware::error::Result;
/// use tokio::sync::mpsc;
///
/// async fn connect_first<R: Reader>(reader: &mut R) -> Result<()> {
///     let (tx, mut rx) = mpsc::channel(1);
///     if let Some(device) = reader.detect(&[]).await {
///         reader.open(&device, tx).await?;
///         while let Some(scan) = rx.recv().await {
///             println!("{:?}", scan.token);
///         }
///     }
///     Ok(())
/// }
/// ```
pub trait Reader: Send + Sync {
    /// Device spec prefixes this reader claims, e.g. `["pn532_uart"]`.
    fn ids(&self) -> &'static [&'static str];

    /// Connect to `device` and start polling into `scans`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The device string is malformed or names another reader variant
    /// - The device does not exist
    /// - The connection handshake fails
    ///
    /// On error no polling is active and no transport is left open.
    async fn open(&mut self, device: &str, scans: mpsc::Sender<Scan>) -> Result<()>;

    /// Stop polling and release the transport.
    ///
    /// Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to close cleanly.
    async fn close(&mut self) -> Result<()>;

    /// Check whether the reader is open and still polling.
    fn connected(&self) -> bool;

    /// Probe for a working device of this variant that is not already in use.
    ///
    /// `connected` lists device specs that must not be returned. The probe
    /// leaves no connection open. Returns `None` when nothing new was found.
    async fn detect(&self, connected: &[String]) -> Option<String>;

    /// Device spec this reader was opened with, empty before `open`.
    fn device(&self) -> &str;

    /// Human readable description.
    fn info(&self) -> String;

    /// Write `text` to the present tag.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::Unsupported` on read-only readers.
    async fn write(&mut self, text: &str) -> Result<Token>;
}
