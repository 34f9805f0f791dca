//! Reader manager.
//!
//! Two activities run while the daemon is up:
//!
//! - **Supervisor** (own task): keeps one reader connected. Every reconnect
//!   interval it checks the reader slot and, when empty or disconnected,
//!   builds a fresh reader, finds a device (configured or detected) and
//!   opens it on the shared scan queue.
//! - **Event loop** (the caller's task): waits on the scan queue and the
//!   software channel, whichever delivers first. It is the only owner of
//!   the debounce state and the exit timer.
//!
//! ```text
//!  ┌────────────┐ open(scan_tx) ┌────────┐  Scan   ┌────────────┐  Token  ┌─────────────┐
//!  │ Supervisor │──────────────►│ Reader │────────►│ Event loop │────────►│ LaunchQueue │
//!  └────────────┘               └────────┘         └────────────┘         └─────────────┘
//!                                                    ▲      │ arm/stop
//!                              Option<Token>         │      ▼
//!                        launcher ─────────────────► │  ┌───────────┐
//!                                                    └──│ ExitTimer │
//!                                                       └───────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tapto_core::constants::{FAIL_SOUND_COOLDOWN_MS, SCAN_QUEUE_CAPACITY};
use tapto_core::{Scan, Token, same_token};
use tapto_hardware::pn532_uart::{Blocklist, Pn532UartReader};
use tapto_hardware::protocol::Pn532Backend;
use tapto_hardware::{AnyReader, Reader};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::DaemonConfig;
use crate::error::{DaemonError, Result};
use crate::exit::{ExitTimer, should_exit};
use crate::launch::{LaunchQueue, SoftwareNotifier, SoftwareReceiver, software_channel};
use crate::platform::Platform;
use crate::state::DaemonState;

/// Builds a fresh, disconnected reader for each connection attempt.
pub type ReaderFactory = Arc<dyn Fn() -> AnyReader + Send + Sync>;

/// Factory for PN532 UART readers sharing one discovery blocklist.
pub fn pn532_uart_factory(backend: Arc<dyn Pn532Backend>, config: &DaemonConfig) -> ReaderFactory {
    let blocklist = Blocklist::new();
    let settings = config.poll_settings();

    Arc::new(move || {
        AnyReader::from(
            Pn532UartReader::new(Arc::clone(&backend))
                .with_blocklist(blocklist.clone())
                .with_poll_settings(settings),
        )
    })
}

/// Supervises the reader connection and turns scans into launches.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tapto_daemon::config::DaemonConfig;
/// use tapto_daemon::launch::launch_queue;
/// use tapto_daemon::manager::{ReaderFactory, ReaderManager};
/// use tapto_daemon::platform::Platform;
/// use tapto_daemon::state::DaemonState;
///
/// # async fn example(platform: Arc<dyn Platform>, factory: ReaderFactory) {
/// let state = Arc::new(DaemonState::new());
/// let (launches, mut rx) = launch_queue();
///
/// let manager = ReaderManager::new(
///     Arc::new(DaemonConfig::default()),
///     platform,
///     state.clone(),
///     launches,
///     factory,
/// );
/// let software = manager.software_notifier();
/// let task = tokio::spawn(manager.run());
///
/// while let Some(token) = rx.recv().await {
///     // launch, then report what is running
///     software.launched(token);
/// }
///
/// state.stop_service();
/// task.await.unwrap();
/// # }
/// ```
pub struct ReaderManager {
    config: Arc<DaemonConfig>,
    platform: Arc<dyn Platform>,
    state: Arc<DaemonState>,
    launches: LaunchQueue,
    factory: ReaderFactory,
    software_tx: SoftwareNotifier,
    software_rx: SoftwareReceiver,
}

impl ReaderManager {
    /// Create a manager. Nothing runs until [`run`](Self::run).
    pub fn new(
        config: Arc<DaemonConfig>,
        platform: Arc<dyn Platform>,
        state: Arc<DaemonState>,
        launches: LaunchQueue,
        factory: ReaderFactory,
    ) -> Self {
        let (software_tx, software_rx) = software_channel();
        Self {
            config,
            platform,
            state,
            launches,
            factory,
            software_tx,
            software_rx,
        }
    }

    /// Sender for launcher state changes.
    pub fn software_notifier(&self) -> SoftwareNotifier {
        self.software_tx.clone()
    }

    /// Run until [`DaemonState::stop_service`] is called.
    ///
    /// On return the supervisor has stopped, any pending exit has been
    /// cancelled and the reader is closed.
    pub async fn run(self) {
        let Self {
            config,
            platform,
            state,
            launches,
            factory,
            software_tx,
            mut software_rx,
        } = self;

        let (scan_tx, mut scan_rx) = mpsc::channel(SCAN_QUEUE_CAPACITY);
        let supervisor = tokio::spawn(supervise(
            factory,
            Arc::clone(&config),
            Arc::clone(&state),
            scan_tx,
        ));

        let mut events = EventLoop {
            config,
            platform,
            state: Arc::clone(&state),
            launches,
            software: software_tx,
            prev_token: None,
            software_token: None,
            exit_timer: None,
            last_error: None,
        };

        while !state.should_stop() {
            tokio::select! {
                _ = state.stopped() => break,
                scan = scan_rx.recv() => match scan {
                    Some(scan) => events.on_scan(scan),
                    None => {
                        error!("Scan queue closed, stopping reader manager");
                        break;
                    }
                },
                Some(token) = software_rx.recv() => events.on_software(token),
            }
        }

        events.cancel_exit();

        if let Err(e) = supervisor.await {
            error!(error = %e, "Reader supervisor failed");
        }

        if let Some(mut reader) = state.take_reader().await
            && let Err(e) = reader.close().await
        {
            warn!(device = %reader.device(), error = %e, "Error closing device");
        }

        info!("Reader manager stopped");
    }
}

/// Connection supervisor body.
async fn supervise(
    factory: ReaderFactory,
    config: Arc<DaemonConfig>,
    state: Arc<DaemonState>,
    scans: mpsc::Sender<Scan>,
) {
    while !state.should_stop() {
        if !state.reader_connected().await
            && let Err(e) = connect_reader(&factory, &config, &state, &scans).await
        {
            error!(error = %e, "Error connecting reader");
        }

        tokio::select! {
            _ = state.stopped() => break,
            _ = tokio::time::sleep(config.reconnect_interval()) => {}
        }
    }

    debug!("Reader supervisor stopped");
}

async fn connect_reader(
    factory: &ReaderFactory,
    config: &DaemonConfig,
    state: &DaemonState,
    scans: &mpsc::Sender<Scan>,
) -> Result<()> {
    info!("Reader not connected, attempting connection");

    if let Some(mut stale) = state.take_reader().await
        && let Err(e) = stale.close().await
    {
        warn!(device = %stale.device(), error = %e, "Error closing stale reader");
    }

    let mut reader = factory();

    let device = match config.connection_string() {
        Some(device) => device.to_string(),
        None => {
            debug!("No device specified, attempting to detect");
            reader
                .detect(&[])
                .await
                .ok_or(DaemonError::NoReaderDetected)?
        }
    };

    reader.open(&device, scans.clone()).await?;
    info!(device = %device, reader = %reader.info(), "Reader connected");

    state.set_reader(reader).await;
    Ok(())
}

/// State owned by the event loop. Nothing else reads or writes it.
struct EventLoop {
    config: Arc<DaemonConfig>,
    platform: Arc<dyn Platform>,
    state: Arc<DaemonState>,
    launches: LaunchQueue,
    software: SoftwareNotifier,
    prev_token: Option<Token>,
    software_token: Option<Token>,
    exit_timer: Option<ExitTimer>,
    last_error: Option<Instant>,
}

impl EventLoop {
    fn on_scan(&mut self, scan: Scan) {
        debug!(device = %scan.source, token = ?scan.token, "Processing scan");

        if let Some(err) = &scan.error {
            error!(device = %scan.source, error = %err, "Error reading card");
            self.play_fail();
            return;
        }

        let token = scan.token;
        if same_token(token.as_ref(), self.prev_token.as_ref()) {
            debug!("Ignoring duplicate scan");
            return;
        }
        self.prev_token = token.clone();

        match token {
            Some(token) => self.on_insert(token),
            None => self.on_remove(),
        }
    }

    fn on_insert(&mut self, token: Token) {
        info!(token = %token, "New token scanned");
        self.state.set_active_card(Some(token.clone()));

        if self.state.is_launcher_disabled() {
            debug!("Launcher disabled, not sending token");
            return;
        }

        if let Some(timer) = &self.exit_timer {
            let stopped = timer.stop();
            if stopped && same_token(Some(&token), self.software_token.as_ref()) {
                info!("Same token reinserted, cancelling exit");
                return;
            }
            if stopped {
                info!("New token inserted, restarting exit timer");
                self.start_timed_exit();
            }
        }

        info!(token = %token, "Sending token");
        self.platform.play_success_sound();
        self.state.set_last_scanned(Some(token.clone()));
        self.launches.enqueue(token);
    }

    fn on_remove(&mut self) {
        info!("Token was removed");
        self.state.set_active_card(None);

        if should_exit(&self.config, self.platform.as_ref(), &self.state) {
            self.start_timed_exit();
        }
    }

    fn on_software(&mut self, token: Option<Token>) {
        debug!(token = ?token, "New software token");

        // "nothing running" never matches, not even a previous "nothing running"
        let unchanged =
            token.is_some() && same_token(token.as_ref(), self.software_token.as_ref());

        if let Some(timer) = &self.exit_timer
            && !unchanged
            && timer.stop()
        {
            info!("Different software token inserted, cancelling exit");
        }

        self.software_token = token;
    }

    fn play_fail(&mut self) {
        let now = Instant::now();
        let cooldown = Duration::from_millis(FAIL_SOUND_COOLDOWN_MS);

        if self
            .last_error
            .is_none_or(|last| now.duration_since(last) > cooldown)
        {
            self.platform.play_fail_sound();
        }
        self.last_error = Some(now);
    }

    fn start_timed_exit(&mut self) {
        if let Some(timer) = &self.exit_timer
            && timer.stop()
        {
            info!("Cancelling previous exit timer");
        }

        let delay = self.config.exit_delay();
        debug!(delay_secs = delay.as_secs(), "Exit timer set");
        self.exit_timer = Some(ExitTimer::start(
            delay,
            Arc::clone(&self.platform),
            self.software.clone(),
        ));
    }

    fn cancel_exit(&mut self) {
        if let Some(timer) = self.exit_timer.take()
            && timer.stop()
        {
            info!("Cancelling pending exit for shutdown");
        }
    }
}
