use crate::domain::model::Lla;
use crate::domain::ports::{ByteCallback, FeedClient, FeedConnector, FeedSettings};
use crate::utils::error::{RelayError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Builder;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_FEED_PORT: u16 = 2101;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const UPLINK_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const READ_SIZE: usize = 4096;

/// Appends `:2101` unless the endpoint already names a port.
pub fn feed_address(endpoint: &str) -> String {
    match endpoint.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => endpoint.to_string(),
        _ => format!("{}:{}", endpoint, DEFAULT_FEED_PORT),
    }
}

/// Lines sent when a session opens.
pub fn session_header(settings: &FeedSettings) -> String {
    let mut header = format!("CLIENT {} {}\r\n", settings.client_id, settings.api_key);
    if let Some(beacon) = &settings.beacon {
        header.push_str(&format!("BEACON {}\r\n", beacon));
    }
    header
}

fn nmea_checksum(body: &str) -> u8 {
    body.bytes().fold(0, |acc, b| acc ^ b)
}

fn nmea_coordinate(value: f64, degree_width: usize) -> String {
    let value = value.abs();
    let degrees = value.trunc();
    let minutes = (value - degrees) * 60.0;
    format!(
        "{:0width$}{:08.5}",
        degrees as u32,
        minutes,
        width = degree_width
    )
}

/// A GGA sentence reporting `position` as a single-point fix at `time`.
pub fn gga_sentence(position: &Lla, time: DateTime<Utc>) -> String {
    let body = format!(
        "GPGGA,{}.{:02},{},{},{},{},1,12,1.0,{:.1},M,0.0,M,,",
        time.format("%H%M%S"),
        time.timestamp_subsec_millis() / 10,
        nmea_coordinate(position.latitude_deg, 2),
        if position.latitude_deg < 0.0 { 'S' } else { 'N' },
        nmea_coordinate(position.longitude_deg, 3),
        if position.longitude_deg < 0.0 { 'W' } else { 'E' },
        position.altitude_m,
    );
    format!("${}*{:02X}\r\n", body, nmea_checksum(&body))
}

type Uplink = Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>;

/// Raw TCP correction feed running on its own thread.
///
/// The thread drives a current-thread runtime. The session reconnects with exponential backoff
/// until the feed is stopped. Position uploads are queued to the session task, so callers never
/// block on the socket.
pub struct TcpFeedClient {
    settings: FeedSettings,
    address: String,
    callback: Mutex<Option<ByteCallback>>,
    uplink: Uplink,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TcpFeedClient {
    pub fn new(settings: FeedSettings, endpoint: &str) -> Self {
        Self {
            address: feed_address(endpoint),
            settings,
            callback: Mutex::new(None),
            uplink: Arc::new(Mutex::new(None)),
            cancel: CancellationToken::new(),
            worker: Mutex::new(None),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_connected(&self) -> bool {
        self.uplink.lock().is_some()
    }
}

async fn open_session(address: &str, settings: &FeedSettings) -> io::Result<TcpStream> {
    let mut stream = TcpStream::connect(address).await?;
    stream.set_nodelay(true)?;
    stream
        .write_all(session_header(settings).as_bytes())
        .await?;
    Ok(stream)
}

/// Delivers bytes and sends queued positions until the peer closes, the socket fails, or the
/// feed is cancelled. `Ok` means cancelled.
async fn pump(
    stream: TcpStream,
    callback: &mut ByteCallback,
    positions: &mut mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
) -> io::Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = [0u8; READ_SIZE];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            read = reader.read(&mut buf) => match read? {
                0 => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "feed closed the connection",
                    ))
                }
                n => callback(&buf[..n]),
            },
            Some(sentence) = positions.recv() => {
                match timeout(UPLINK_WRITE_TIMEOUT, writer.write_all(sentence.as_bytes())).await {
                    Ok(result) => result?,
                    Err(_) => tracing::warn!("Position upload timed out; sentence dropped"),
                }
            }
        }
    }
}

async fn run_feed(
    address: String,
    settings: FeedSettings,
    mut callback: ByteCallback,
    uplink: Uplink,
    cancel: CancellationToken,
) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = timeout(CONNECT_TIMEOUT, open_session(&address, &settings)) => result,
        };

        match connected {
            Ok(Ok(stream)) => {
                tracing::info!("Connected to correction feed at {}", address);
                backoff = INITIAL_BACKOFF;

                let (tx, mut positions) = mpsc::unbounded_channel();
                *uplink.lock() = Some(tx);
                let result = pump(stream, &mut callback, &mut positions, &cancel).await;
                uplink.lock().take();
                match result {
                    Ok(()) => break,
                    Err(e) => tracing::warn!("Correction feed {} dropped: {}", address, e),
                }
            }
            Ok(Err(e)) => tracing::warn!("Unable to reach correction feed {}: {}", address, e),
            Err(_) => tracing::warn!(
                "Connecting to correction feed {} timed out after {:?}",
                address,
                CONNECT_TIMEOUT
            ),
        }

        tracing::debug!("Reconnecting to {} in {:?}", address, backoff);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
    tracing::debug!("Correction feed {} stopped", address);
}

impl FeedClient for TcpFeedClient {
    fn set_correction_callback(&mut self, callback: ByteCallback) {
        *self.callback.get_mut() = Some(callback);
    }

    fn run_async(&mut self) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() || self.cancel.is_cancelled() {
            return Err(RelayError::FeedError {
                message: format!("feed {} was already started", self.address),
            });
        }
        let callback = self.callback.get_mut().take().ok_or_else(|| RelayError::FeedError {
            message: "no correction callback registered".to_string(),
        })?;

        if let Some(auth) = &self.settings.auth_endpoint {
            tracing::debug!("Feed {} bound to auth endpoint {}", self.address, auth);
        }

        let runtime = Builder::new_current_thread().enable_all().build()?;
        let address = self.address.clone();
        let settings = self.settings.clone();
        let uplink = Arc::clone(&self.uplink);
        let cancel = self.cancel.clone();
        let handle = thread::Builder::new()
            .name(format!("feed-{}", self.settings.client_id))
            .spawn(move || {
                runtime.block_on(run_feed(address, settings, callback, uplink, cancel));
                // A DNS lookup may still be running on the blocking pool.
                runtime.shutdown_background();
            })?;
        *worker = Some(handle);
        Ok(())
    }

    fn upload_position(&self, position: &Lla) {
        let uplink = self.uplink.lock();
        let Some(tx) = uplink.as_ref() else {
            tracing::debug!("Feed {} not connected; position not sent", self.address);
            return;
        };
        if tx.send(gga_sentence(position, Utc::now())).is_err() {
            tracing::debug!("Feed {} session ended; position not sent", self.address);
        }
    }

    fn stop(&self) {
        self.cancel.cancel();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                tracing::error!("Correction feed thread for {} panicked", self.address);
            }
        }
    }
}

impl Drop for TcpFeedClient {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Builds [`TcpFeedClient`]s from settings that name an endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpFeedConnector;

impl FeedConnector for TcpFeedConnector {
    fn connect(&self, settings: FeedSettings) -> Result<Box<dyn FeedClient>> {
        let endpoint = settings.endpoint.clone().ok_or_else(|| RelayError::FeedError {
            message: format!("no endpoint configured for client '{}'", settings.client_id),
        })?;
        Ok(Box::new(TcpFeedClient::new(settings, &endpoint)))
    }
}
