//! Mock token reader for testing and development.
//!
//! A [`MockReaderHandle`] plays the part of the physical world: it decides
//! which devices detection finds, puts tokens on the reader, pulls them off
//! again and unplugs the device. Readers minted from the same handle share
//! that world, so a supervisor that replaces a dead reader with a fresh one
//! keeps talking to the same simulated hardware.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tapto_core::{DeviceSpec, Scan, Token, TokenType};
use tokio::sync::mpsc;

use crate::error::{HardwareError, Result};
use crate::traits::Reader;

/// Device spec prefix claimed by mock readers.
pub const MOCK_READER_ID: &str = "mock";

#[derive(Debug, Default)]
struct World {
    devices: Vec<String>,
    active: Option<usize>,
    device: String,
    scans: Option<mpsc::Sender<Scan>>,
    fail_open: bool,
    opened: usize,
    closed: usize,
    written: Vec<String>,
}

#[derive(Debug, Default)]
struct Shared {
    world: Mutex<World>,
    next_id: AtomicUsize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Mock reader driven by a [`MockReaderHandle`].
///
/// # Examples
///
/// ```
/// use tapto_core::{Token, TokenType};
/// use tapto_hardware::mock::MockReader;
/// use tapto_hardware::traits::Reader;
///
/// #[tokio::main]
/// async fn main() -> tapto_hardware::Result<()> {
///     let (mut reader, handle) = MockReader::new();
///     let (tx, mut rx) = tokio::sync::mpsc::channel(1);
///
///     reader.open("mock:reader0", tx).await?;
///     handle.insert(Token::new("04a1", TokenType::Ntag, "mock:reader0")).await?;
///
///     let scan = rx.recv().await.unwrap();
///     assert_eq!(scan.token.unwrap().uid, "04a1");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockReader {
    shared: Arc<Shared>,
    id: usize,
    device: String,
}

impl MockReader {
    /// Create a reader and the handle controlling it.
    pub fn new() -> (Self, MockReaderHandle) {
        let handle = MockReaderHandle {
            shared: Arc::new(Shared::default()),
        };
        (handle.reader(), handle)
    }
}

impl Reader for MockReader {
    fn ids(&self) -> &'static [&'static str] {
        &[MOCK_READER_ID]
    }

    async fn open(&mut self, device: &str, scans: mpsc::Sender<Scan>) -> Result<()> {
        let spec = DeviceSpec::parse(device)?;
        spec.expect_reader(self.ids())?;

        let mut world = self.shared.lock();
        if world.fail_open {
            return Err(HardwareError::initialization_failed(format!(
                "mock device {device} refused to open"
            )));
        }
        if world.active == Some(self.id) {
            return Err(HardwareError::configuration(format!(
                "reader already open on {}",
                self.device
            )));
        }

        world.active = Some(self.id);
        world.device = device.to_string();
        world.scans = Some(scans);
        world.opened += 1;
        self.device = device.to_string();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut world = self.shared.lock();
        if world.active == Some(self.id) {
            world.active = None;
            world.scans = None;
            world.closed += 1;
        }
        Ok(())
    }

    fn connected(&self) -> bool {
        self.shared.lock().active == Some(self.id)
    }

    async fn detect(&self, connected: &[String]) -> Option<String> {
        self.shared
            .lock()
            .devices
            .iter()
            .find(|device| !connected.contains(device))
            .cloned()
    }

    fn device(&self) -> &str {
        &self.device
    }

    fn info(&self) -> String {
        format!("Mock reader ({})", self.device)
    }

    async fn write(&mut self, text: &str) -> Result<Token> {
        if !self.connected() {
            return Err(HardwareError::disconnected(self.device.as_str()));
        }
        self.shared.lock().written.push(text.to_string());
        Ok(Token::new("mock", TokenType::Ntag, self.device.as_str()).with_text(text))
    }
}

impl Drop for MockReader {
    fn drop(&mut self) {
        let mut world = self.shared.lock();
        if world.active == Some(self.id) {
            world.active = None;
            world.scans = None;
        }
    }
}

/// Handle simulating the hardware behind one or more [`MockReader`]s.
#[derive(Debug, Clone)]
pub struct MockReaderHandle {
    shared: Arc<Shared>,
}

impl MockReaderHandle {
    /// Mint a fresh disconnected reader bound to this handle.
    pub fn reader(&self) -> MockReader {
        MockReader {
            shared: Arc::clone(&self.shared),
            id: self.shared.next_id.fetch_add(1, Ordering::SeqCst),
            device: String::new(),
        }
    }

    /// Set the device specs detection reports, in order.
    pub fn set_devices<I, S>(&self, devices: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shared.lock().devices = devices.into_iter().map(Into::into).collect();
    }

    /// Make subsequent opens fail.
    pub fn set_fail_open(&self, fail: bool) {
        self.shared.lock().fail_open = fail;
    }

    /// Put `token` on the reader.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::Disconnected` when no reader is open.
    pub async fn insert(&self, token: Token) -> Result<()> {
        let (device, scans) = self.sender()?;
        let token = Token {
            source: device.clone(),
            ..token
        };
        send(&scans, Scan::inserted(device, token)).await
    }

    /// Take the token off the reader.
    pub async fn remove(&self) -> Result<()> {
        let (device, scans) = self.sender()?;
        send(&scans, Scan::removed(device)).await
    }

    /// Report a read failure.
    pub async fn fail(&self, error: &str) -> Result<()> {
        let (device, scans) = self.sender()?;
        send(&scans, Scan::failed(device, error)).await
    }

    /// Unplug the device. The open reader reports itself disconnected.
    pub fn disconnect(&self) {
        let mut world = self.shared.lock();
        world.active = None;
        world.scans = None;
    }

    /// Check whether any reader bound to this handle is open.
    pub fn is_connected(&self) -> bool {
        self.shared.lock().active.is_some()
    }

    /// Device spec of the last successful open.
    pub fn device(&self) -> String {
        self.shared.lock().device.clone()
    }

    /// Number of successful opens.
    pub fn open_count(&self) -> usize {
        self.shared.lock().opened
    }

    /// Number of explicit closes of an open reader.
    pub fn close_count(&self) -> usize {
        self.shared.lock().closed
    }

    /// Texts written through any reader.
    pub fn written(&self) -> Vec<String> {
        self.shared.lock().written.clone()
    }

    fn sender(&self) -> Result<(String, mpsc::Sender<Scan>)> {
        let world = self.shared.lock();
        match (&world.active, &world.scans) {
            (Some(_), Some(scans)) => Ok((world.device.clone(), scans.clone())),
            _ => Err(HardwareError::disconnected("mock reader not open")),
        }
    }
}

async fn send(scans: &mpsc::Sender<Scan>, scan: Scan) -> Result<()> {
    scans
        .send(scan)
        .await
        .map_err(|_| HardwareError::disconnected("scan queue closed"))
}
