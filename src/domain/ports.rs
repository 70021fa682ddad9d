use crate::domain::model::{LineSettings, Lla, PositionSample};
use crate::utils::error::Result;
use std::io::Write;
use tokio::io::AsyncRead;

/// Receives a chunk of bytes. Invoked synchronously by whichever context produced the bytes.
pub type ByteCallback = Box<dyn FnMut(&[u8]) + Send>;

pub type PositionCallback = Box<dyn FnMut(&PositionSample) + Send>;

/// The correction engine. The relay only ever touches it while holding the producer lock, and
/// the engine invokes its registered callbacks synchronously from inside the handler calls.
pub trait CorrectionProducer: Send + 'static {
    fn handle_receiver_data(&mut self, data: &[u8]);
    fn handle_primary_correction(&mut self, data: &[u8]);
    fn handle_secondary_correction(&mut self, data: &[u8]);
    fn set_correction_callback(&mut self, callback: ByteCallback);
    fn set_position_callback(&mut self, callback: PositionCallback);
}

/// Identity and bindings for one network correction feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    pub api_key: String,
    pub client_id: String,
    pub auth_endpoint: Option<String>,
    pub endpoint: Option<String>,
    pub beacon: Option<String>,
}

impl FeedSettings {
    pub fn new(api_key: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client_id: client_id.into(),
            auth_endpoint: None,
            endpoint: None,
            beacon: None,
        }
    }

    pub fn with_auth_endpoint(mut self, hostname: impl Into<String>) -> Self {
        self.auth_endpoint = Some(hostname.into());
        self
    }

    pub fn with_endpoint(mut self, hostname: impl Into<String>) -> Self {
        self.endpoint = Some(hostname.into());
        self
    }

    pub fn with_beacon(mut self, beacon: impl Into<String>) -> Self {
        self.beacon = Some(beacon.into());
        self
    }
}

/// A network correction feed that runs on its own thread.
pub trait FeedClient: Send + Sync {
    fn set_correction_callback(&mut self, callback: ByteCallback);

    /// Starts the feed's thread. Correction bytes arrive on that thread through the callback.
    fn run_async(&mut self) -> Result<()>;

    /// Must not block on anything the feed thread holds while it is inside the correction callback.
    fn upload_position(&self, position: &Lla);

    /// Blocks until the feed's thread has exited. Idempotent.
    fn stop(&self);
}

pub trait FeedConnector: Send + Sync {
    fn connect(&self, settings: FeedSettings) -> Result<Box<dyn FeedClient>>;
}

pub type DeviceReader = Box<dyn AsyncRead + Send + Unpin>;
pub type DeviceWriter = Box<dyn Write + Send>;

/// An opened serial device: an async read half polled by the reactor and a blocking write half.
pub struct SerialDevice {
    pub reader: DeviceReader,
    pub writer: DeviceWriter,
}

/// Opens serial devices. Called with the reactor's runtime context entered, both from the
/// orchestrator thread and from the reactor itself when a channel reconnects.
pub trait SerialBackend: Send + Sync + 'static {
    fn open(&self, path: &str, settings: &LineSettings) -> std::io::Result<SerialDevice>;
}
