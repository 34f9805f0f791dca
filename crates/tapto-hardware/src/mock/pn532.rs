//! Scripted PN532 backend for driver tests.
//!
//! Each port gets a [`LinkScript`] describing how its handshake behaves and
//! what every passive-target poll returns. Once the poll script runs out the
//! last step repeats forever, so a script ending in `Present` models a tag
//! left on the reader.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tapto_core::TokenType;

use crate::error::{HardwareError, Result};
use crate::protocol::{FirmwareVersion, GeneralStatus, Pn532Backend, Pn532Link, TagData, Target};

/// Outcome of one passive-target poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    /// Field is empty.
    Empty,
    /// A tag is present.
    Present(Target),
    /// Protocol error.
    Error,
}

impl PollStep {
    /// NTAG with the given UID is present.
    pub fn ntag(uid: &str) -> Self {
        Self::Present(Target::new(TokenType::Ntag, uid))
    }

    /// Mifare tag with the given UID is present.
    pub fn mifare(uid: &str) -> Self {
        Self::Present(Target::new(TokenType::Mifare, uid))
    }
}

/// Behavior of one port.
#[derive(Debug, Clone, Default)]
pub struct LinkScript {
    handshake_fails: bool,
    polls: Vec<PollStep>,
    payloads: HashMap<String, Vec<u8>>,
    unreadable: HashSet<String>,
    poll_delay: Duration,
}

impl LinkScript {
    /// A working chip with an empty field.
    pub fn new() -> Self {
        Self::default()
    }

    /// A port whose handshake fails (not a PN532, or busy).
    pub fn broken() -> Self {
        Self {
            handshake_fails: true,
            ..Self::default()
        }
    }

    /// Append poll outcomes.
    pub fn polls(mut self, steps: impl IntoIterator<Item = PollStep>) -> Self {
        self.polls.extend(steps);
        self
    }

    /// Payload returned when the NTAG with `uid` is read.
    pub fn payload(mut self, uid: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.payloads.insert(uid.to_string(), bytes.into());
        self
    }

    /// Every NTAG read of `uid` fails.
    pub fn unreadable(mut self, uid: &str) -> Self {
        self.unreadable.insert(uid.to_string());
        self
    }

    /// Block the calling thread this long on every passive-target poll.
    pub fn poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }
}

#[derive(Debug, Default)]
struct PortStats {
    opened: usize,
    closed: usize,
    polls: usize,
    ntag_reads: usize,
}

#[derive(Debug, Default)]
struct BackendState {
    ports: Vec<String>,
    scripts: HashMap<String, LinkScript>,
    stats: HashMap<String, PortStats>,
    list_fails: bool,
}

/// In-memory [`Pn532Backend`].
///
/// Text records are decoded as plain UTF-8; invalid UTF-8 is a parse error.
///
/// # Examples
///
/// ```
/// use tapto_hardware::mock::{LinkScript, MockBackend, PollStep};
/// use tapto_hardware::protocol::Pn532Backend;
///
/// let backend = MockBackend::new()
///     .with_port("/dev/ttyUSB0", LinkScript::new().polls([PollStep::ntag("04a1")]));
///
/// let mut link = backend.open("/dev/ttyUSB0").unwrap();
/// assert!(link.in_list_passive_target().unwrap().is_some());
/// assert_eq!(backend.open_count("/dev/ttyUSB0"), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<BackendState>>,
}

impl MockBackend {
    /// Create a backend without ports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a port, listed in insertion order.
    pub fn with_port(self, path: &str, script: LinkScript) -> Self {
        self.add_port(path, script);
        self
    }

    /// Add or replace a port.
    pub fn add_port(&self, path: &str, script: LinkScript) {
        let mut state = self.lock();
        if !state.ports.iter().any(|p| p == path) {
            state.ports.push(path.to_string());
        }
        state.scripts.insert(path.to_string(), script);
    }

    /// Make port enumeration fail.
    pub fn fail_listing(&self) {
        self.lock().list_fails = true;
    }

    /// Number of times `path` was opened.
    pub fn open_count(&self, path: &str) -> usize {
        self.stat(path, |s| s.opened)
    }

    /// Number of times a link to `path` was closed.
    pub fn close_count(&self, path: &str) -> usize {
        self.stat(path, |s| s.closed)
    }

    /// Number of passive-target polls issued against `path`.
    pub fn poll_count(&self, path: &str) -> usize {
        self.stat(path, |s| s.polls)
    }

    /// Number of NTAG payload reads issued against `path`.
    pub fn ntag_read_count(&self, path: &str) -> usize {
        self.stat(path, |s| s.ntag_reads)
    }

    fn stat(&self, path: &str, field: impl Fn(&PortStats) -> usize) -> usize {
        self.lock().stats.get(path).map(field).unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Pn532Backend for MockBackend {
    fn ports(&self) -> Result<Vec<String>> {
        let state = self.lock();
        if state.list_fails {
            return Err(HardwareError::communication("port enumeration failed"));
        }
        Ok(state.ports.clone())
    }

    fn open(&self, path: &str) -> Result<Box<dyn Pn532Link>> {
        let mut state = self.lock();
        let script = state
            .scripts
            .get(path)
            .cloned()
            .ok_or_else(|| HardwareError::disconnected(path))?;
        state.stats.entry(path.to_string()).or_default().opened += 1;

        Ok(Box::new(MockLink {
            path: path.to_string(),
            handshake_fails: script.handshake_fails,
            polls: script.polls.into(),
            last: PollStep::Empty,
            payloads: script.payloads,
            unreadable: script.unreadable,
            poll_delay: script.poll_delay,
            backend: self.clone(),
            open: true,
        }))
    }

    fn parse_text_record(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| HardwareError::invalid_data(format!("bad text record: {e}")))
    }
}

struct MockLink {
    path: String,
    handshake_fails: bool,
    polls: VecDeque<PollStep>,
    last: PollStep,
    payloads: HashMap<String, Vec<u8>>,
    unreadable: HashSet<String>,
    poll_delay: Duration,
    backend: MockBackend,
    open: bool,
}

impl MockLink {
    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(HardwareError::disconnected(self.path.as_str()))
        }
    }

    fn handshake_step(&self) -> Result<()> {
        self.ensure_open()?;
        if self.handshake_fails {
            return Err(HardwareError::initialization_failed("no ACK from PN532"));
        }
        Ok(())
    }

    fn with_stats(&self, update: impl FnOnce(&mut PortStats)) {
        let mut state = self.backend.lock();
        update(state.stats.entry(self.path.clone()).or_default());
    }
}

impl Pn532Link for MockLink {
    fn sam_configuration(&mut self) -> Result<()> {
        self.handshake_step()
    }

    fn firmware_version(&mut self) -> Result<FirmwareVersion> {
        self.handshake_step()?;
        Ok(FirmwareVersion {
            ic: 0x32,
            version: 1,
            revision: 6,
            support: 0x07,
        })
    }

    fn general_status(&mut self) -> Result<GeneralStatus> {
        self.handshake_step()?;
        Ok(GeneralStatus::default())
    }

    fn in_list_passive_target(&mut self) -> Result<Option<Target>> {
        self.ensure_open()?;
        self.with_stats(|s| s.polls += 1);
        if !self.poll_delay.is_zero() {
            std::thread::sleep(self.poll_delay);
        }

        if let Some(step) = self.polls.pop_front() {
            self.last = step;
        }

        match &self.last {
            PollStep::Empty => Ok(None),
            PollStep::Present(target) => Ok(Some(target.clone())),
            PollStep::Error => Err(HardwareError::communication("frame checksum mismatch")),
        }
    }

    fn read_ntag(&mut self) -> Result<TagData> {
        self.ensure_open()?;
        self.with_stats(|s| s.ntag_reads += 1);

        let uid = match &self.last {
            PollStep::Present(target) => target.uid.clone(),
            _ => return Err(HardwareError::card_read("no tag in field")),
        };
        if self.unreadable.contains(&uid) {
            return Err(HardwareError::card_read("NTAG page read timed out"));
        }

        Ok(TagData {
            kind: TokenType::Ntag,
            bytes: self.payloads.get(&uid).cloned().unwrap_or_default(),
        })
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.with_stats(|s| s.closed += 1);
        }
        Ok(())
    }
}
