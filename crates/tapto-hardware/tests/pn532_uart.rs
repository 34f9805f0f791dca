//! Integration tests for the PN532 UART driver
//!
//! The chip is scripted through `MockBackend`; everything above the
//! `Pn532Link` seam is the real driver.

use std::sync::Arc;
use std::time::Duration;

use tapto_core::{Scan, TokenType};
use tapto_hardware::HardwareError;
use tapto_hardware::mock::{LinkScript, MockBackend, PollStep};
use tapto_hardware::pn532_uart::{Blocklist, PollSettings, PortFilter, Pn532UartReader};
use tapto_hardware::traits::Reader;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(2);

fn fast() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(1),
        max_errors: 5,
    }
}

fn reader(backend: &MockBackend) -> Pn532UartReader {
    Pn532UartReader::new(Arc::new(backend.clone()))
        .with_port_filter(PortFilter::windows())
        .with_poll_settings(fast())
}

async fn next_scan(rx: &mut mpsc::Receiver<Scan>) -> Scan {
    timeout(WAIT, rx.recv())
        .await
        .expect("Scan timeout")
        .expect("Scan queue closed")
}

async fn wait_disconnected(reader: &Pn532UartReader) {
    timeout(WAIT, async {
        while reader.connected() {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("Reader never disconnected");
}

#[tokio::test]
async fn test_insert_and_remove_emitted_once() {
    let backend = MockBackend::new().with_port(
        "COM3",
        LinkScript::new()
            .polls([
                PollStep::ntag("04a1b2"),
                PollStep::ntag("04a1b2"),
                PollStep::ntag("04a1b2"),
                PollStep::Empty,
            ])
            .payload("04a1b2", b"hello".to_vec()),
    );
    let mut reader = reader(&backend);
    let (tx, mut rx) = mpsc::channel(1);

    reader.open("pn532_uart:COM3", tx).await.unwrap();
    assert!(reader.connected());
    assert_eq!(reader.device(), "pn532_uart:COM3");
    assert_eq!(reader.info(), "PN532 UART (COM3)");

    let inserted = next_scan(&mut rx).await;
    let token = inserted.token.expect("Expected a token");
    assert_eq!(inserted.source, "pn532_uart:COM3");
    assert_eq!(token.uid, "04a1b2");
    assert_eq!(token.kind, TokenType::Ntag);
    assert_eq!(token.text, "hello");
    assert_eq!(token.data, "68656c6c6f");
    assert_eq!(token.source, "pn532_uart:COM3");
    assert!(!token.from_api);

    let removed = next_scan(&mut rx).await;
    assert!(removed.token.is_none());
    assert!(!removed.is_error());

    sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(backend.ntag_read_count("COM3"), 1);

    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_removal_without_token_is_silent() {
    let backend =
        MockBackend::new().with_port("COM3", LinkScript::new().polls([PollStep::Empty]));
    let mut reader = reader(&backend);
    let (tx, mut rx) = mpsc::channel(1);

    reader.open("pn532_uart:COM3", tx).await.unwrap();
    sleep(Duration::from_millis(50)).await;

    assert!(backend.poll_count("COM3") > 1);
    assert!(rx.try_recv().is_err());
    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_swapped_tag_emits_new_token() {
    let backend = MockBackend::new().with_port(
        "COM3",
        LinkScript::new()
            .polls([PollStep::ntag("aa"), PollStep::ntag("bb")])
            .payload("aa", b"first".to_vec())
            .payload("bb", b"second".to_vec()),
    );
    let mut reader = reader(&backend);
    let (tx, mut rx) = mpsc::channel(1);

    reader.open("pn532_uart:COM3", tx).await.unwrap();

    let first = next_scan(&mut rx).await.token.unwrap();
    let second = next_scan(&mut rx).await.token.unwrap();
    assert_eq!((first.uid.as_str(), first.text.as_str()), ("aa", "first"));
    assert_eq!((second.uid.as_str(), second.text.as_str()), ("bb", "second"));

    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_error_budget_disconnects_reader() {
    let backend =
        MockBackend::new().with_port("COM3", LinkScript::new().polls([PollStep::Error]));
    let mut reader = reader(&backend);
    let (tx, mut rx) = mpsc::channel(1);

    reader.open("pn532_uart:COM3", tx).await.unwrap();
    wait_disconnected(&reader).await;

    assert_eq!(backend.poll_count("COM3"), 5);
    assert_eq!(backend.close_count("COM3"), 1);

    // poll task dropped its sender without emitting anything
    let end = timeout(WAIT, rx.recv()).await.unwrap();
    assert!(end.is_none());

    reader.close().await.unwrap();
    assert_eq!(backend.close_count("COM3"), 1);
}

#[tokio::test]
async fn test_present_tag_resets_error_count() {
    let mut steps = vec![PollStep::Error; 4];
    steps.push(PollStep::ntag("aa"));
    steps.extend(vec![PollStep::Error; 4]);
    steps.push(PollStep::ntag("aa"));

    let backend = MockBackend::new().with_port("COM3", LinkScript::new().polls(steps));
    let mut reader = reader(&backend);
    let (tx, mut rx) = mpsc::channel(4);

    reader.open("pn532_uart:COM3", tx).await.unwrap();
    let scan = next_scan(&mut rx).await;
    assert_eq!(scan.token.unwrap().uid, "aa");

    sleep(Duration::from_millis(50)).await;
    assert!(reader.connected());
    assert_eq!(backend.ntag_read_count("COM3"), 1);

    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_unreadable_tag_exhausts_error_budget() {
    let backend = MockBackend::new().with_port(
        "COM3",
        LinkScript::new()
            .polls([PollStep::ntag("aa")])
            .unreadable("aa"),
    );
    let mut reader = reader(&backend);
    let (tx, mut rx) = mpsc::channel(1);

    reader.open("pn532_uart:COM3", tx).await.unwrap();
    wait_disconnected(&reader).await;

    assert_eq!(backend.poll_count("COM3"), 5);
    assert_eq!(backend.ntag_read_count("COM3"), 5);
    assert_eq!(backend.close_count("COM3"), 1);

    let end = timeout(WAIT, rx.recv()).await.unwrap();
    assert!(end.is_none());

    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_successful_read_resets_error_count() {
    let mut steps = vec![PollStep::ntag("bad"); 4];
    steps.push(PollStep::ntag("good"));
    steps.extend(vec![PollStep::ntag("bad"); 4]);
    steps.push(PollStep::ntag("good"));

    let backend = MockBackend::new().with_port(
        "COM3",
        LinkScript::new()
            .polls(steps)
            .payload("good", b"ok".to_vec())
            .unreadable("bad"),
    );
    let mut reader = reader(&backend);
    let (tx, mut rx) = mpsc::channel(4);

    reader.open("pn532_uart:COM3", tx).await.unwrap();
    let scan = next_scan(&mut rx).await;
    assert_eq!(scan.token.unwrap().uid, "good");

    sleep(Duration::from_millis(50)).await;
    assert!(reader.connected());
    // second "good" is the unchanged UID and is not read again
    assert_eq!(backend.ntag_read_count("COM3"), 9);
    assert!(rx.try_recv().is_err());

    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_connected_does_not_wait_for_serial_call() {
    let backend = MockBackend::new().with_port(
        "COM3",
        LinkScript::new()
            .polls([PollStep::Empty])
            .poll_delay(Duration::from_millis(300)),
    );
    let mut reader = reader(&backend);
    let (tx, _rx) = mpsc::channel(1);

    reader.open("pn532_uart:COM3", tx).await.unwrap();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.poll_count("COM3"), 1);

    let started = std::time::Instant::now();
    assert!(reader.connected());
    assert!(started.elapsed() < Duration::from_millis(100));

    reader.close().await.unwrap();
    assert!(!reader.connected());
    assert_eq!(backend.close_count("COM3"), 1);
}

#[tokio::test]
async fn test_mifare_is_skipped() {
    let backend =
        MockBackend::new().with_port("COM3", LinkScript::new().polls([PollStep::mifare("cafe")]));
    let mut reader = reader(&backend);
    let (tx, mut rx) = mpsc::channel(1);

    reader.open("pn532_uart:COM3", tx).await.unwrap();
    sleep(Duration::from_millis(50)).await;

    assert!(rx.try_recv().is_err());
    assert!(reader.connected());
    assert_eq!(backend.ntag_read_count("COM3"), 0);

    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_undecodable_text_degrades_to_empty() {
    let backend = MockBackend::new().with_port(
        "COM3",
        LinkScript::new()
            .polls([PollStep::ntag("aa")])
            .payload("aa", vec![0xff, 0xfe]),
    );
    let mut reader = reader(&backend);
    let (tx, mut rx) = mpsc::channel(1);

    reader.open("pn532_uart:COM3", tx).await.unwrap();
    let token = next_scan(&mut rx).await.token.unwrap();

    assert_eq!(token.uid, "aa");
    assert_eq!(token.text, "");
    assert_eq!(token.data, "fffe");

    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_unknown_target_has_empty_payload() {
    let backend = MockBackend::new().with_port(
        "COM3",
        LinkScript::new().polls([PollStep::Present(tapto_hardware::protocol::Target::new(
            TokenType::Unknown,
            "0102",
        ))]),
    );
    let mut reader = reader(&backend);
    let (tx, mut rx) = mpsc::channel(1);

    reader.open("pn532_uart:COM3", tx).await.unwrap();
    let token = next_scan(&mut rx).await.token.unwrap();

    assert_eq!(token.kind, TokenType::Unknown);
    assert_eq!(token.data, "");
    assert_eq!(backend.ntag_read_count("COM3"), 0);

    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_closed_queue_releases_transport() {
    let backend =
        MockBackend::new().with_port("COM3", LinkScript::new().polls([PollStep::ntag("aa")]));
    let mut reader = reader(&backend);
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    reader.open("pn532_uart:COM3", tx).await.unwrap();
    wait_disconnected(&reader).await;

    assert_eq!(backend.close_count("COM3"), 1);
}

#[tokio::test]
async fn test_open_rejects_malformed_or_foreign_spec() {
    let backend = MockBackend::new().with_port("COM3", LinkScript::new());
    let mut reader = reader(&backend);

    for device in ["COM3", "libnfc:COM3", "pn532_uart:", ":COM3"] {
        let (tx, _rx) = mpsc::channel(1);
        let err = reader.open(device, tx).await.unwrap_err();
        assert!(err.is_configuration(), "{device}: {err}");
    }

    assert_eq!(backend.open_count("COM3"), 0);
    assert!(!reader.connected());
}

#[tokio::test]
async fn test_open_requires_device_node() {
    let dir = tempfile::tempdir().unwrap();
    let present = dir.path().join("ttyUSB0");
    std::fs::write(&present, b"").unwrap();
    let present = present.to_string_lossy().into_owned();
    let missing = dir.path().join("ttyUSB1").to_string_lossy().into_owned();

    let backend = MockBackend::new()
        .with_port(&present, LinkScript::new())
        .with_port(&missing, LinkScript::new());
    let filter = PortFilter::with_prefixes([dir.path().join("ttyUSB").to_string_lossy()]);
    let mut reader = reader(&backend).with_port_filter(filter);

    let (tx, _rx) = mpsc::channel(1);
    let err = reader
        .open(&format!("pn532_uart:{missing}"), tx)
        .await
        .unwrap_err();
    assert!(matches!(err, HardwareError::Io(_)));
    assert_eq!(backend.open_count(&missing), 0);

    let (tx, _rx) = mpsc::channel(1);
    reader
        .open(&format!("pn532_uart:{present}"), tx)
        .await
        .unwrap();
    assert!(reader.connected());

    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_failed_handshake_leaves_nothing_open() {
    let backend = MockBackend::new().with_port("COM3", LinkScript::broken());
    let mut reader = reader(&backend);
    let (tx, mut rx) = mpsc::channel(1);

    let err = reader.open("pn532_uart:COM3", tx).await.unwrap_err();
    assert!(matches!(err, HardwareError::InitializationFailed { .. }));

    assert!(!reader.connected());
    assert_eq!(backend.open_count("COM3"), 1);
    assert_eq!(backend.close_count("COM3"), 1);
    assert_eq!(backend.poll_count("COM3"), 0);
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_open_twice_is_rejected() {
    let backend = MockBackend::new()
        .with_port("COM3", LinkScript::new())
        .with_port("COM4", LinkScript::new());
    let mut reader = reader(&backend);

    let (tx, _rx) = mpsc::channel(1);
    reader.open("pn532_uart:COM3", tx).await.unwrap();

    let (tx, _rx2) = mpsc::channel(1);
    let err = reader.open("pn532_uart:COM4", tx).await.unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(backend.open_count("COM4"), 0);
    assert_eq!(reader.device(), "pn532_uart:COM3");

    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let backend = MockBackend::new().with_port("COM3", LinkScript::new());
    let mut reader = reader(&backend);

    reader.close().await.unwrap();

    let (tx, _rx) = mpsc::channel(1);
    reader.open("pn532_uart:COM3", tx).await.unwrap();
    reader.close().await.unwrap();
    reader.close().await.unwrap();

    assert!(!reader.connected());
    assert_eq!(backend.close_count("COM3"), 1);
}

#[tokio::test]
async fn test_write_is_unsupported() {
    let backend = MockBackend::new().with_port("COM3", LinkScript::new());
    let mut reader = reader(&backend);

    let err = reader.write("**launch.system:menu").await.unwrap_err();
    assert!(matches!(err, HardwareError::Unsupported { .. }));
}

#[tokio::test]
async fn test_detect_blocklists_failed_ports() {
    let backend = MockBackend::new()
        .with_port("/dev/ttyS0", LinkScript::new())
        .with_port("/dev/ttyUSB0", LinkScript::broken())
        .with_port("/dev/ttyUSB1", LinkScript::new());
    let blocklist = Blocklist::new();
    let reader = Pn532UartReader::new(Arc::new(backend.clone()))
        .with_port_filter(PortFilter::linux())
        .with_blocklist(blocklist.clone());

    let found = reader.detect(&[]).await;
    assert_eq!(found.as_deref(), Some("pn532_uart:/dev/ttyUSB1"));
    assert!(blocklist.contains("/dev/ttyUSB0"));
    assert_eq!(backend.open_count("/dev/ttyS0"), 0);

    // probe left nothing open
    assert_eq!(backend.close_count("/dev/ttyUSB1"), 1);

    let again = reader.detect(&[]).await;
    assert_eq!(again.as_deref(), Some("pn532_uart:/dev/ttyUSB1"));
    assert_eq!(backend.open_count("/dev/ttyUSB0"), 1);
}

#[tokio::test]
async fn test_detect_skips_connected_devices() {
    let backend = MockBackend::new()
        .with_port("/dev/ttyUSB0", LinkScript::new())
        .with_port("/dev/ttyACM0", LinkScript::new());
    let reader = Pn532UartReader::new(Arc::new(backend.clone()))
        .with_port_filter(PortFilter::linux());

    let exact = vec!["pn532_uart:/dev/ttyUSB0".to_string()];
    assert_eq!(
        reader.detect(&exact).await.as_deref(),
        Some("pn532_uart:/dev/ttyACM0")
    );

    let claimed = vec![
        "pn532_uart:/dev/ttyUSB0".to_string(),
        "libnfc:pn532_uart:/dev/ttyACM0".to_string(),
    ];
    assert_eq!(reader.detect(&claimed).await, None);
    assert_eq!(backend.open_count("/dev/ttyUSB0"), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_detect_skips_symlink_to_connected_device() {
    let dir = tempfile::tempdir().unwrap();
    let real = dir.path().join("ttyUSB0");
    let alias = dir.path().join("ttyUSB-reader");
    std::fs::write(&real, b"").unwrap();
    std::os::unix::fs::symlink(&real, &alias).unwrap();

    let real = real.to_string_lossy().into_owned();
    let alias = alias.to_string_lossy().into_owned();

    let backend = MockBackend::new().with_port(&alias, LinkScript::new());
    let filter = PortFilter::with_prefixes([dir.path().join("ttyUSB").to_string_lossy()]);
    let reader = Pn532UartReader::new(Arc::new(backend.clone())).with_port_filter(filter);

    let connected = vec![format!("pn532_uart:{real}")];
    assert_eq!(reader.detect(&connected).await, None);
    assert_eq!(backend.open_count(&alias), 0);

    assert_eq!(
        reader.detect(&[]).await,
        Some(format!("pn532_uart:{alias}"))
    );
}

#[tokio::test]
async fn test_detect_survives_enumeration_failure() {
    let backend = MockBackend::new().with_port("/dev/ttyUSB0", LinkScript::new());
    backend.fail_listing();
    let reader = Pn532UartReader::new(Arc::new(backend.clone()))
        .with_port_filter(PortFilter::linux());

    assert_eq!(reader.detect(&[]).await, None);
}
