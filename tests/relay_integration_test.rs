use correction_relay::adapters::TcpFeedConnector;
use correction_relay::config::RelayConfig;
use correction_relay::core::bringup::BringUpPlan;
use correction_relay::domain::model::{LineSettings, Lla, PositionSample};
use correction_relay::domain::ports::{
    ByteCallback, CorrectionProducer, FeedClient, FeedConnector, FeedSettings, PositionCallback,
    SerialBackend, SerialDevice,
};
use correction_relay::{RelayError, Result, StreamRelay};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;

// ---------- scripted serial devices ----------

struct ScriptedReader {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl AsyncRead for ScriptedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.pending.is_empty() {
            match self.rx.poll_recv(cx) {
                Poll::Ready(Some(data)) => self.pending = data,
                Poll::Ready(None) | Poll::Pending => return Poll::Pending,
            }
        }
        let n = self.pending.len().min(buf.remaining());
        buf.put_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Poll::Ready(Ok(()))
    }
}

struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct FakeDevice {
    input: mpsc::UnboundedSender<Vec<u8>>,
    written: Arc<Mutex<Vec<u8>>>,
}

impl FakeDevice {
    fn send(&self, data: &[u8]) {
        self.input.send(data.to_vec()).unwrap();
    }

    fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }
}

#[derive(Default)]
struct FakeSerialBackend {
    devices: Mutex<VecDeque<SerialDevice>>,
    opened: Mutex<Vec<(String, LineSettings)>>,
}

impl FakeSerialBackend {
    fn with_devices(count: usize) -> (Arc<Self>, Vec<FakeDevice>) {
        let backend = Arc::new(Self::default());
        let mut handles = Vec::new();
        for _ in 0..count {
            let (tx, rx) = mpsc::unbounded_channel();
            let written = Arc::new(Mutex::new(Vec::new()));
            backend.devices.lock().push_back(SerialDevice {
                reader: Box::new(ScriptedReader {
                    rx,
                    pending: Vec::new(),
                }),
                writer: Box::new(SharedWriter(Arc::clone(&written))),
            });
            handles.push(FakeDevice { input: tx, written });
        }
        (backend, handles)
    }

    fn opened_paths(&self) -> Vec<String> {
        self.opened.lock().iter().map(|(path, _)| path.clone()).collect()
    }
}

impl SerialBackend for FakeSerialBackend {
    fn open(&self, path: &str, settings: &LineSettings) -> io::Result<SerialDevice> {
        self.opened.lock().push((path.to_string(), *settings));
        self.devices
            .lock()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such device"))
    }
}

// ---------- fake feeds ----------

#[derive(Clone, Default)]
struct FeedTap {
    callback: Arc<Mutex<Option<ByteCallback>>>,
    uploads: Arc<Mutex<Vec<Lla>>>,
    stopped: Arc<AtomicBool>,
}

impl FeedTap {
    /// Delivers bytes the way the feed's own thread would.
    fn inject(&self, data: &[u8]) {
        let mut callback = self.callback.lock();
        let callback = callback.as_mut().expect("feed not started");
        callback(data);
    }
}

struct FakeFeed {
    tap: FeedTap,
    pending: Mutex<Option<ByteCallback>>,
}

impl FeedClient for FakeFeed {
    fn set_correction_callback(&mut self, callback: ByteCallback) {
        *self.pending.lock() = Some(callback);
    }

    fn run_async(&mut self) -> Result<()> {
        *self.tap.callback.lock() = self.pending.lock().take();
        Ok(())
    }

    fn upload_position(&self, position: &Lla) {
        self.tap.uploads.lock().push(*position);
    }

    fn stop(&self) {
        self.tap.callback.lock().take();
        self.tap.stopped.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeConnector {
    connected: Mutex<Vec<(FeedSettings, FeedTap)>>,
}

impl FakeConnector {
    fn tap(&self, index: usize) -> FeedTap {
        self.connected.lock()[index].1.clone()
    }

    fn settings(&self, index: usize) -> FeedSettings {
        self.connected.lock()[index].0.clone()
    }
}

impl FeedConnector for FakeConnector {
    fn connect(&self, settings: FeedSettings) -> Result<Box<dyn FeedClient>> {
        let tap = FeedTap::default();
        self.connected.lock().push((settings, tap.clone()));
        Ok(Box::new(FakeFeed {
            tap,
            pending: Mutex::new(None),
        }))
    }
}

// ---------- producer ----------

#[derive(Clone, Default)]
struct Seen {
    receiver: Arc<Mutex<Vec<u8>>>,
    primary: Arc<Mutex<Vec<u8>>>,
    secondary: Arc<Mutex<Vec<u8>>>,
}

/// Echoes primary corrections to the output and reports a fix ten seconds apart per call.
struct EchoProducer {
    seen: Seen,
    output: Option<ByteCallback>,
    position: Option<PositionCallback>,
    tow: f64,
}

impl EchoProducer {
    fn new(seen: Seen) -> Self {
        Self {
            seen,
            output: None,
            position: None,
            tow: 0.0,
        }
    }
}

impl CorrectionProducer for EchoProducer {
    fn handle_receiver_data(&mut self, data: &[u8]) {
        self.seen.receiver.lock().extend_from_slice(data);
    }

    fn handle_primary_correction(&mut self, data: &[u8]) {
        self.seen.primary.lock().extend_from_slice(data);
        if let Some(output) = self.output.as_mut() {
            output(data);
        }
        self.tow += 10.0;
        if let Some(position) = self.position.as_mut() {
            position(&PositionSample::new(
                2300,
                self.tow,
                Lla::new(48.85, 2.35, 35.0),
            ));
        }
    }

    fn handle_secondary_correction(&mut self, data: &[u8]) {
        self.seen.secondary.lock().extend_from_slice(data);
    }

    fn set_correction_callback(&mut self, callback: ByteCallback) {
        self.output = Some(callback);
    }

    fn set_position_callback(&mut self, callback: PositionCallback) {
        self.position = Some(callback);
    }
}

// ---------- helpers ----------

fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn base_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.receiver.configure = false;
    config.producer.geoid_file = Some("/tmp/geoid.pgm".to_string());
    config
}

fn start(
    config: &RelayConfig,
    seen: &Seen,
    backend: Arc<FakeSerialBackend>,
    feeds: Arc<FakeConnector>,
) -> Result<StreamRelay<EchoProducer>> {
    StreamRelay::start_with_pacing(
        config,
        EchoProducer::new(seen.clone()),
        backend,
        feeds,
        Duration::ZERO,
    )
}

// ---------- tests ----------

#[test]
fn test_receiver_bytes_reach_producer_and_are_counted() {
    let (backend, devices) = FakeSerialBackend::with_devices(2);
    let seen = Seen::default();
    let relay = start(&base_config(), &seen, backend.clone(), Arc::default()).unwrap();

    assert_eq!(backend.opened_paths(), vec!["/dev/ttyACM0", "/dev/ttyACM0"]);

    let receiver = &devices[1];
    receiver.send(b"\x24\x40sbf-1");
    receiver.send(b"\x24\x40sbf-2");
    assert!(wait_until(|| seen.receiver.lock().len() == 14));

    let stats = relay.shutdown();
    assert_eq!(stats.receiver_in, 14);
    assert_eq!(stats.output, 0);
    assert_eq!(seen.receiver.lock().as_slice(), b"\x24\x40sbf-1\x24\x40sbf-2");
}

#[test]
fn test_bring_up_commands_are_written_to_output() {
    let (backend, devices) = FakeSerialBackend::with_devices(2);
    let mut config = base_config();
    config.receiver.configure = true;

    let relay = start(&config, &Seen::default(), backend, Arc::default()).unwrap();

    let expected: String = BringUpPlan::from_config(&config).commands().concat();
    assert_eq!(devices[0].written(), expected.into_bytes());
    assert_eq!(relay.stats().output, 0);
}

#[test]
fn test_primary_feed_corrections_flow_to_output() {
    let (backend, devices) = FakeSerialBackend::with_devices(2);
    let feeds = Arc::new(FakeConnector::default());
    let mut config = base_config();
    config.primary_feed.enabled = true;
    config.primary_feed.api_key = Some("primary-key".to_string());
    config.primary_feed.endpoint = Some("corrections.example.com".to_string());
    config.primary_feed.auth_endpoint = Some("auth.example.com".to_string());

    let seen = Seen::default();
    let relay = start(&config, &seen, backend, feeds.clone()).unwrap();
    assert!(relay.active_sources().primary_feed);

    let settings = feeds.settings(0);
    assert_eq!(settings.api_key, "primary-key");
    assert_eq!(settings.endpoint.as_deref(), Some("corrections.example.com"));
    assert_eq!(settings.auth_endpoint.as_deref(), Some("auth.example.com"));
    assert_eq!(settings.beacon, None);

    let feed = feeds.tap(0);
    feed.inject(b"\xd3\x00\x04rtcm");
    feed.inject(b"\xd3\x00\x02ok");

    assert_eq!(devices[0].written(), b"\xd3\x00\x04rtcm\xd3\x00\x02ok");
    let stats = relay.shutdown();
    assert_eq!(stats.primary_feed_in, 12);
    assert_eq!(stats.output, 12);
    assert!(feed.stopped.load(Ordering::SeqCst));
}

#[test]
fn test_feeds_without_endpoints_use_built_in_hosts() {
    let (backend, _devices) = FakeSerialBackend::with_devices(2);
    let feeds = Arc::new(FakeConnector::default());
    let mut config = base_config();
    config.primary_feed.enabled = true;
    config.primary_feed.api_key = Some("primary-key".to_string());
    config.secondary_feed.enabled = true;
    config.secondary_feed.api_key = Some("secondary-key".to_string());
    config.secondary_feed.beacon = Some("B1".to_string());

    let relay = start(&config, &Seen::default(), backend, feeds.clone()).unwrap();

    let primary = feeds.settings(0);
    assert_eq!(primary.endpoint.as_deref(), Some("polaris.pointonenav.com"));
    assert_eq!(primary.auth_endpoint.as_deref(), Some("api.pointonenav.com"));
    let secondary = feeds.settings(1);
    assert_eq!(secondary.endpoint.as_deref(), Some("ssrz.polaris.p1beta.com"));
    assert_eq!(secondary.auth_endpoint.as_deref(), Some("api.p1beta.com"));

    // The real connector accepts what the relay hands over.
    assert!(TcpFeedConnector.connect(primary).is_ok());
    assert!(TcpFeedConnector.connect(secondary).is_ok());
    relay.shutdown();
}

#[test]
fn test_positions_are_throttled_to_primary_feed() {
    let (backend, _devices) = FakeSerialBackend::with_devices(2);
    let feeds = Arc::new(FakeConnector::default());
    let mut config = base_config();
    config.primary_feed.enabled = true;
    config.primary_feed.api_key = Some("primary-key".to_string());

    let relay = start(&config, &Seen::default(), backend, feeds.clone()).unwrap();
    let feed = feeds.tap(0);

    // Fixes at tow 10, 20, 30, 40, 50: only 10 and 40 are 30 s apart.
    for _ in 0..5 {
        feed.inject(b"x");
    }

    assert_eq!(feed.uploads.lock().len(), 2);
    drop(relay);
}

#[test]
fn test_secondary_feed_uses_secondary_handler() {
    let (backend, _devices) = FakeSerialBackend::with_devices(2);
    let feeds = Arc::new(FakeConnector::default());
    let mut config = base_config();
    config.secondary_feed.enabled = true;
    config.secondary_feed.api_key = Some("secondary-key".to_string());
    config.secondary_feed.beacon = Some("B12".to_string());

    let seen = Seen::default();
    let relay = start(&config, &seen, backend, feeds.clone()).unwrap();
    assert_eq!(feeds.settings(0).beacon.as_deref(), Some("B12"));

    feeds.tap(0).inject(b"ssr-data");
    assert_eq!(seen.secondary.lock().as_slice(), b"ssr-data");
    assert!(seen.primary.lock().is_empty());

    let stats = relay.shutdown();
    assert_eq!(stats.secondary_feed_in, 8);
    assert_eq!(stats.primary_feed_in, 0);
}

#[test]
fn test_missing_api_key_aborts_startup() {
    let (backend, _devices) = FakeSerialBackend::with_devices(2);
    let feeds = Arc::new(FakeConnector::default());
    let mut config = base_config();
    config.primary_feed.enabled = true;

    let err = start(&config, &Seen::default(), backend.clone(), feeds.clone())
        .err()
        .expect("startup should fail");

    assert!(matches!(err, RelayError::MissingConfigError { ref field } if field == "primary_feed.api_key"));
    assert!(feeds.connected.lock().is_empty());
    // Only the output channel was opened before the failure.
    assert_eq!(backend.opened.lock().len(), 1);
}

#[test]
fn test_missing_beacon_aborts_startup_and_stops_primary_feed() {
    let (backend, _devices) = FakeSerialBackend::with_devices(2);
    let feeds = Arc::new(FakeConnector::default());
    let mut config = base_config();
    config.primary_feed.enabled = true;
    config.primary_feed.api_key = Some("primary-key".to_string());
    config.secondary_feed.enabled = true;
    config.secondary_feed.api_key = Some("secondary-key".to_string());

    let err = start(&config, &Seen::default(), backend, feeds.clone())
        .err()
        .expect("startup should fail");

    assert!(matches!(err, RelayError::MissingConfigError { ref field } if field == "secondary_feed.beacon"));
    assert_eq!(feeds.connected.lock().len(), 1);
    assert!(feeds.tap(0).stopped.load(Ordering::SeqCst));
}

#[test]
fn test_receiver_open_failure_aborts_startup() {
    let (backend, _devices) = FakeSerialBackend::with_devices(1);
    let err = start(&base_config(), &Seen::default(), backend, Arc::default())
        .err()
        .expect("startup should fail");
    assert!(matches!(err, RelayError::DeviceOpenError { .. }));
}

#[test]
fn test_lband_bytes_are_logged_and_counted() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("lband.bin");
    std::fs::write(&log_path, b"old run").unwrap();

    let (backend, devices) = FakeSerialBackend::with_devices(3);
    let mut config = base_config();
    config.lband.enabled = true;
    config.lband.baud_rate = 115_200;
    config.lband.log_path = Some(log_path.to_string_lossy().into_owned());

    let seen = Seen::default();
    let relay = start(&config, &seen, backend.clone(), Arc::default()).unwrap();
    assert!(relay.active_sources().lband);
    assert_eq!(
        backend.opened_paths(),
        vec!["/dev/ttyACM0", "/dev/ttyACM1", "/dev/ttyACM0"]
    );
    assert_eq!(backend.opened.lock()[1].1.baud_rate(), 115_200);

    devices[1].send(b"lband-frame-1");
    devices[1].send(b"lband-frame-2");
    assert!(wait_until(|| seen.secondary.lock().len() == 26));

    let stats = relay.shutdown();
    assert_eq!(stats.secondary_in, 26);
    assert_eq!(std::fs::read(&log_path).unwrap(), b"lband-frame-1lband-frame-2");
}

#[test]
fn test_no_deliveries_after_shutdown() {
    let (backend, devices) = FakeSerialBackend::with_devices(2);
    let seen = Seen::default();
    let relay = start(&base_config(), &seen, backend, Arc::default()).unwrap();

    devices[1].send(b"before");
    assert!(wait_until(|| seen.receiver.lock().len() == 6));
    let stats = relay.shutdown();

    let _ = devices[1].input.send(b"after".to_vec());
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(seen.receiver.lock().as_slice(), b"before");
    assert_eq!(stats.receiver_in, 6);
}
