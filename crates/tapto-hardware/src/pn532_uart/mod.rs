//! PN532 reader over a UART serial connection.
//!
//! # Lifecycle
//!
//! 1. [`Reader::open`] validates the device string, checks the device node
//!    exists, opens the port and runs the connect handshake (SAM
//!    configuration, firmware version, general status).
//! 2. A poll task queries for a passive target every poll interval and
//!    turns presence changes into [`Scan`] events.
//! 3. The task stops on [`Reader::close`], or on its own after too many
//!    consecutive protocol errors. In the latter case the reader reports
//!    itself disconnected and the daemon's supervisor opens a fresh one.
//!
//! ```text
//!  ┌────────────┐  in_list_passive_target   ┌───────────┐  Scan   ┌─────────┐
//!  │ Poll task  │──────────────────────────►│ Pn532Link │         │ Manager │
//!  │ (250ms)    │◄──────────────────────────│           │         │         │
//!  └────────────┘   Target / None / Error   └───────────┘         └─────────┘
//!        │                                                            ▲
//!        └──────────────────── mpsc::Sender<Scan> ────────────────────┘
//! ```

mod blocklist;
mod discovery;
mod ports;
mod serial;

pub use blocklist::Blocklist;
pub use ports::PortFilter;
pub use serial::{SerialBackend, port_settings};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tapto_core::constants::{MAX_POLL_ERRORS, POLL_INTERVAL_MS};
use tapto_core::{DeviceSpec, Scan, Token, TokenType};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{HardwareError, Result};
use crate::protocol::{Pn532Backend, Pn532Link, TagData, Target};
use crate::traits::Reader;

/// Device spec prefix claimed by this reader.
pub const READER_ID: &str = "pn532_uart";

/// Poll loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between two polls.
    pub interval: Duration,
    /// Consecutive protocol errors before the reader disconnects itself.
    pub max_errors: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(POLL_INTERVAL_MS),
            max_errors: MAX_POLL_ERRORS,
        }
    }
}

/// Open the link at `path` and run the connect handshake.
///
/// A link that fails the handshake is closed before returning the error.
pub(crate) fn connect(backend: &dyn Pn532Backend, path: &str) -> Result<Box<dyn Pn532Link>> {
    debug!(port = %path, "Connecting to PN532");
    let mut link = backend.open(path)?;

    match handshake(link.as_mut()) {
        Ok(()) => Ok(link),
        Err(e) => {
            let _ = link.close();
            Err(e)
        }
    }
}

fn handshake(link: &mut dyn Pn532Link) -> Result<()> {
    link.sam_configuration()?;

    let firmware = link.firmware_version()?;
    debug!(?firmware, "PN532 firmware version");

    let status = link.general_status()?;
    debug!(?status, "PN532 general status");

    Ok(())
}

/// State shared between a reader and its poll task.
struct Session {
    /// Cleared before the link is taken, so readers of connection state
    /// never touch the link lock.
    polling: AtomicBool,
    link: Mutex<Option<Box<dyn Pn532Link>>>,
}

impl Session {
    fn new(link: Box<dyn Pn532Link>) -> Self {
        Self {
            polling: AtomicBool::new(true),
            link: Mutex::new(Some(link)),
        }
    }

    fn is_polling(&self) -> bool {
        self.polling.load(Ordering::SeqCst)
    }

    /// Stop polling and close the link. Idempotent.
    fn release(&self) -> Result<()> {
        self.polling.store(false, Ordering::SeqCst);
        let link = self.link.lock().unwrap_or_else(|e| e.into_inner()).take();
        match link {
            Some(mut link) => link.close(),
            None => Ok(()),
        }
    }

    /// [`release`](Self::release) on the blocking pool. The link lock may
    /// be held by an in-flight serial call.
    async fn shutdown(self: Arc<Self>) -> Result<()> {
        self.polling.store(false, Ordering::SeqCst);
        tokio::task::spawn_blocking(move || self.release())
            .await
            .map_err(|e| HardwareError::other(format!("PN532 close task failed: {e}")))?
    }

    /// Run a blocking link operation off the async runtime.
    async fn call<T, F>(self: &Arc<Self>, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Pn532Link) -> Result<T> + Send + 'static,
    {
        let session = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let mut guard = session
                .link
                .lock()
                .map_err(|_| HardwareError::other("PN532 link lock poisoned"))?;
            let link = guard
                .as_mut()
                .ok_or_else(|| HardwareError::disconnected("PN532 link released"))?;
            op(link.as_mut())
        })
        .await
        .map_err(|e| HardwareError::other(format!("PN532 link task failed: {e}")))?
    }
}

/// PN532 NFC reader on a serial port.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tapto_hardware::pn532_uart::{Pn532UartReader, SerialBackend};
/// use tapto_hardware::protocol::Pn532Protocol;
/// use tapto_hardware::traits::Reader;
///
/// # async fn example(protocol: Arc<dyn Pn532Protocol>) -> tapto_hardware::Result<()> {
/// let backend = Arc::new(SerialBackend::new(protocol));
/// let mut reader = Pn532UartReader::new(backend);
///
/// let (tx, mut rx) = tokio::sync::mpsc::channel(1);
/// reader.open("pn532_uart:/dev/ttyUSB0", tx).await?;
///
/// while let Some(scan) = rx.recv().await {
///     println!("{:?}", scan.token);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Pn532UartReader {
    backend: Arc<dyn Pn532Backend>,
    blocklist: Blocklist,
    filter: PortFilter,
    settings: PollSettings,
    device: String,
    name: String,
    session: Option<Arc<Session>>,
    poller: Option<JoinHandle<()>>,
}

impl Pn532UartReader {
    /// Create a disconnected reader using host defaults.
    pub fn new(backend: Arc<dyn Pn532Backend>) -> Self {
        Self {
            backend,
            blocklist: Blocklist::new(),
            filter: PortFilter::host(),
            settings: PollSettings::default(),
            device: String::new(),
            name: String::new(),
            session: None,
            poller: None,
        }
    }

    /// Share a discovery blocklist with other readers.
    pub fn with_blocklist(mut self, blocklist: Blocklist) -> Self {
        self.blocklist = blocklist;
        self
    }

    /// Override the host port naming rules.
    pub fn with_port_filter(mut self, filter: PortFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Override poll loop tuning.
    pub fn with_poll_settings(mut self, settings: PollSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Discovery blocklist used by this reader.
    pub fn blocklist(&self) -> &Blocklist {
        &self.blocklist
    }
}

impl std::fmt::Debug for Pn532UartReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pn532UartReader")
            .field("device", &self.device)
            .field("connected", &self.connected())
            .finish_non_exhaustive()
    }
}

impl Drop for Pn532UartReader {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        if let Some(session) = self.session.take() {
            session.polling.store(false, Ordering::SeqCst);
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn_blocking(move || session.release());
                }
                Err(_) => {
                    let _ = session.release();
                }
            }
        }
    }
}

impl Reader for Pn532UartReader {
    fn ids(&self) -> &'static [&'static str] {
        &[READER_ID]
    }

    async fn open(&mut self, device: &str, scans: mpsc::Sender<Scan>) -> Result<()> {
        let spec = DeviceSpec::parse(device)?;
        spec.expect_reader(self.ids())?;

        if self.connected() {
            return Err(HardwareError::configuration(format!(
                "reader already open on {}",
                self.device
            )));
        }

        let path = spec.path().to_string();
        if self.filter.has_device_nodes() {
            tokio::fs::metadata(&path).await?;
        }

        let backend = Arc::clone(&self.backend);
        let port = path.clone();
        let link = tokio::task::spawn_blocking(move || connect(backend.as_ref(), &port))
            .await
            .map_err(|e| HardwareError::other(format!("connect task failed: {e}")))??;

        let session = Arc::new(Session::new(link));
        self.device = device.to_string();
        self.name = path;
        self.poller = Some(tokio::spawn(poll(
            Arc::clone(&session),
            Arc::clone(&self.backend),
            self.device.clone(),
            self.settings,
            scans,
        )));
        self.session = Some(session);

        info!(device = %self.device, "PN532 reader connected");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        match self.session.take() {
            Some(session) => session.shutdown().await,
            None => Ok(()),
        }
    }

    fn connected(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_polling())
    }

    async fn detect(&self, connected: &[String]) -> Option<String> {
        let backend = Arc::clone(&self.backend);
        let filter = self.filter.clone();
        let blocklist = self.blocklist.clone();
        let connected = connected.to_vec();

        tokio::task::spawn_blocking(move || {
            discovery::detect(backend.as_ref(), &filter, &blocklist, &connected)
        })
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, "Detection task failed");
            None
        })
    }

    fn device(&self) -> &str {
        &self.device
    }

    fn info(&self) -> String {
        format!("PN532 UART ({})", self.name)
    }

    async fn write(&mut self, _text: &str) -> Result<Token> {
        Err(HardwareError::unsupported(
            "writing not supported on this reader",
        ))
    }
}

/// Poll task body. Owns the remembered token; nothing else touches it.
async fn poll(
    session: Arc<Session>,
    backend: Arc<dyn Pn532Backend>,
    device: String,
    settings: PollSettings,
    scans: mpsc::Sender<Scan>,
) {
    let mut errors = 0u32;
    let mut last_token: Option<Token> = None;

    while session.is_polling() {
        if errors >= settings.max_errors {
            error!(device = %device, errors, "Too many errors, disconnecting reader");
            if let Err(e) = Arc::clone(&session).shutdown().await {
                warn!(device = %device, error = %e, "Failed to close serial port");
            }
            break;
        }

        tokio::time::sleep(settings.interval).await;

        let target = match session.call(|link| link.in_list_passive_target()).await {
            Ok(target) => target,
            Err(e) => {
                error!(device = %device, error = %e, "Failed to read passive target");
                errors += 1;
                continue;
            }
        };

        let Some(target) = target else {
            if last_token.take().is_some() {
                debug!(device = %device, "Token removed");
                if scans.send(Scan::removed(device.as_str())).await.is_err() {
                    break;
                }
            }
            continue;
        };

        if last_token.as_ref().is_some_and(|t| t.uid == target.uid) {
            errors = 0;
            continue;
        }

        // a failed payload read keeps the budget running
        let data = match read_payload(&session, &target).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                errors = 0;
                continue;
            }
            Err(e) => {
                error!(device = %device, error = %e, "Failed to read tag payload");
                errors += 1;
                continue;
            }
        };
        errors = 0;

        let token = build_token(backend.as_ref(), &device, target, &data);

        if !last_token.as_ref().is_some_and(|t| t.same_contents(&token)) {
            let scan = Scan::inserted(device.as_str(), token.clone());
            if scans.send(scan).await.is_err() {
                break;
            }
        }

        last_token = Some(token);
    }

    if session.is_polling() {
        debug!(device = %device, "Scan queue closed, releasing reader");
        let _ = session.shutdown().await;
    }
}

/// Read the payload appropriate to the target type, `None` for tags the
/// reader cannot handle.
async fn read_payload(session: &Arc<Session>, target: &Target) -> Result<Option<TagData>> {
    match target.kind {
        TokenType::Ntag => session.call(|link| link.read_ntag()).await.map(Some),
        TokenType::Mifare => {
            warn!(uid = %target.uid, "Mifare not supported");
            Ok(None)
        }
        TokenType::Unknown => Ok(Some(TagData::default())),
    }
}

fn build_token(backend: &dyn Pn532Backend, device: &str, target: Target, data: &TagData) -> Token {
    let hex = data.hex();
    debug!(bytes = %hex, "Record bytes");

    let text = backend.parse_text_record(&data.bytes).unwrap_or_else(|e| {
        error!(error = %e, "Error parsing NDEF record");
        String::new()
    });

    if text.is_empty() {
        warn!(uid = %target.uid, "No text NDEF found");
    } else {
        info!(text = %text, "Decoded text NDEF");
    }

    Token::new(target.uid, target.kind, device)
        .with_text(text)
        .with_data(hex)
}
