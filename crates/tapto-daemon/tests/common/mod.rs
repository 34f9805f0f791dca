//! Shared harness for reader manager integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tapto_core::{Token, TokenType};
use tapto_daemon::config::DaemonConfig;
use tapto_daemon::launch::{LaunchReceiver, SoftwareNotifier, launch_queue};
use tapto_daemon::platform::Platform;
use tapto_daemon::state::DaemonState;
use tapto_daemon::{DaemonError, ReaderFactory, ReaderManager};
use tapto_hardware::AnyReader;
use tapto_hardware::mock::{MockReader, MockReaderHandle};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

pub const DEVICE: &str = "mock:reader0";

/// Platform that records every call.
#[derive(Default)]
pub struct RecordingPlatform {
    launcher: Mutex<Option<String>>,
    kill_fails: AtomicBool,
    kills: AtomicUsize,
    success_sounds: AtomicUsize,
    fail_sounds: AtomicUsize,
}

impl RecordingPlatform {
    pub fn running(launcher: &str) -> Self {
        let platform = Self::default();
        platform.set_launcher(Some(launcher));
        platform
    }

    pub fn set_launcher(&self, launcher: Option<&str>) {
        *self.launcher.lock().unwrap() = launcher.map(str::to_string);
    }

    pub fn fail_kills(&self) {
        self.kill_fails.store(true, Ordering::SeqCst);
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    pub fn success_sounds(&self) -> usize {
        self.success_sounds.load(Ordering::SeqCst)
    }

    pub fn fail_sounds(&self) -> usize {
        self.fail_sounds.load(Ordering::SeqCst)
    }
}

impl Platform for RecordingPlatform {
    fn active_launcher(&self) -> Option<String> {
        self.launcher.lock().unwrap().clone()
    }

    fn kill_launcher(&self) -> tapto_daemon::Result<()> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        if self.kill_fails.load(Ordering::SeqCst) {
            return Err(DaemonError::Io(std::io::Error::other("no such process")));
        }
        self.set_launcher(None);
        Ok(())
    }

    fn play_success_sound(&self) {
        self.success_sounds.fetch_add(1, Ordering::SeqCst);
    }

    fn play_fail_sound(&self) {
        self.fail_sounds.fetch_add(1, Ordering::SeqCst);
    }
}

/// A running reader manager wired to a mock reader.
pub struct Harness {
    pub state: Arc<DaemonState>,
    pub platform: Arc<RecordingPlatform>,
    pub reader: MockReaderHandle,
    pub launches: LaunchReceiver,
    pub software: SoftwareNotifier,
    task: JoinHandle<()>,
}

impl Harness {
    /// Start a manager whose reader detection finds `devices`.
    pub fn spawn(config: DaemonConfig, platform: RecordingPlatform, devices: &[&str]) -> Self {
        let (_, reader) = MockReader::new();
        reader.set_devices(devices.iter().copied());

        let factory: ReaderFactory = {
            let reader = reader.clone();
            Arc::new(move || AnyReader::from(reader.reader()))
        };

        let state = Arc::new(DaemonState::new());
        let platform = Arc::new(platform);
        let (queue, launches) = launch_queue();

        let manager = ReaderManager::new(
            Arc::new(config),
            platform.clone(),
            state.clone(),
            queue,
            factory,
        );
        let software = manager.software_notifier();
        let task = tokio::spawn(manager.run());

        Self {
            state,
            platform,
            reader,
            launches,
            software,
            task,
        }
    }

    /// Start with exit on removal enabled and a running launcher, then wait
    /// for the reader to connect.
    pub async fn connected(exit_delay_secs: u64) -> Self {
        let config = DaemonConfig {
            exit_on_removal: true,
            exit_delay_secs,
            ..DaemonConfig::default()
        };
        let harness = Self::spawn(config, RecordingPlatform::running("PSX"), &[DEVICE]);
        harness.wait_connected().await;
        harness
    }

    pub async fn wait_connected(&self) {
        timeout(Duration::from_secs(30), async {
            while !self.state.reader_connected().await {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("Reader never connected");
    }

    pub async fn insert(&self, token: &Token) {
        self.reader.insert(token.clone()).await.unwrap();
        settle().await;
    }

    pub async fn remove(&self) {
        self.reader.remove().await.unwrap();
        settle().await;
    }

    /// Drain every launched token.
    pub fn launched(&mut self) -> Vec<String> {
        let mut uids = Vec::new();
        while let Some(token) = self.launches.try_recv() {
            uids.push(token.uid);
        }
        uids
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Request shutdown and wait for the manager to return.
    pub async fn shutdown(self) {
        self.state.stop_service();
        timeout(Duration::from_secs(30), self.task)
            .await
            .expect("Manager did not stop")
            .unwrap();
    }
}

/// Let spawned tasks run to quiescence.
pub async fn settle() {
    sleep(Duration::from_millis(10)).await;
}

pub fn token(uid: &str, text: &str) -> Token {
    Token::new(uid, TokenType::Ntag, DEVICE).with_text(text)
}
