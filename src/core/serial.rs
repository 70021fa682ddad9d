use crate::core::reactor::ReactorHandle;
use crate::domain::model::LineSettings;
use crate::domain::ports::{ByteCallback, DeviceReader, DeviceWriter, SerialBackend};
use crate::utils::error::{RelayError, Result};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{mpsc, Arc};
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle as TaskHandle;

const READ_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    Closed = 0,
    Open = 1,
    Closing = 2,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Lifecycle::Open,
            2 => Lifecycle::Closing,
            _ => Lifecycle::Closed,
        }
    }
}

#[derive(Debug, Clone)]
struct DeviceTarget {
    path: String,
    settings: LineSettings,
}

/// State shared between the owning [`SerialChannel`], its writers, and its read task.
struct ChannelShared {
    label: String,
    lifecycle: AtomicU8,
    dormant: AtomicBool,
    target: Mutex<Option<DeviceTarget>>,
    writer: Mutex<Option<DeviceWriter>>,
    parked_reader: Mutex<Option<DeviceReader>>,
}

impl ChannelShared {
    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::SeqCst))
    }

    fn is_open(&self) -> bool {
        self.lifecycle() == Lifecycle::Open
    }

    fn path(&self) -> String {
        self.target
            .lock()
            .as_ref()
            .map(|t| t.path.clone())
            .unwrap_or_default()
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        if data.is_empty() || !self.is_open() {
            return Ok(0);
        }

        let mut writer = self.writer.lock();
        let Some(device) = writer.as_mut() else {
            return Ok(0);
        };

        tracing::trace!("Sending {} bytes to {}", data.len(), self.label);
        write_fully(device.as_mut(), data).map_err(|(written, source)| RelayError::WriteError {
            path: self.path(),
            written,
            total: data.len(),
            source,
        })?;
        Ok(data.len())
    }
}

/// Loops over partial writes until the device has accepted every byte.
fn write_fully(
    device: &mut (dyn Write + Send),
    data: &[u8],
) -> std::result::Result<(), (usize, io::Error)> {
    let mut written = 0;
    while written < data.len() {
        match device.write(&data[written..]) {
            Ok(0) => {
                return Err((
                    written,
                    io::Error::new(io::ErrorKind::WriteZero, "device accepted no bytes"),
                ))
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => std::thread::yield_now(),
            Err(e) => return Err((written, e)),
        }
    }
    Ok(())
}

/// Cloneable blocking write access to a channel, usable from any thread.
#[derive(Clone)]
pub struct ChannelWriter {
    shared: Arc<ChannelShared>,
}

impl ChannelWriter {
    /// Returns the number of bytes written: all of `data`, or 0 when the channel is not open.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        self.shared.write(data)
    }

    pub fn write_str(&self, text: &str) -> Result<usize> {
        self.shared.write(text.as_bytes())
    }
}

struct ReadTask {
    task: TaskHandle<()>,
    // Disconnects once the read future has been dropped.
    finished: mpsc::Receiver<()>,
}

/// One serial device: 8N1 framing, a reactor-driven read loop with a single reconnect attempt,
/// and a blocking write.
pub struct SerialChannel {
    shared: Arc<ChannelShared>,
    reactor: ReactorHandle,
    backend: Arc<dyn SerialBackend>,
    read_task: Option<ReadTask>,
}

impl SerialChannel {
    pub fn new(
        label: impl Into<String>,
        reactor: ReactorHandle,
        backend: Arc<dyn SerialBackend>,
    ) -> Self {
        Self {
            shared: Arc::new(ChannelShared {
                label: label.into(),
                lifecycle: AtomicU8::new(Lifecycle::Closed as u8),
                dormant: AtomicBool::new(false),
                target: Mutex::new(None),
                writer: Mutex::new(None),
                parked_reader: Mutex::new(None),
            }),
            reactor,
            backend,
            read_task: None,
        }
    }

    /// Opens the device write-only. Reads start with [`SerialChannel::start_reading`].
    pub fn open(&mut self, path: &str, baud_rate: u32) -> Result<()> {
        match self.shared.lifecycle() {
            Lifecycle::Closed => {}
            Lifecycle::Open if self.is_dormant() => self.close(),
            _ => {
                tracing::error!("The port '{}' is already opened.", path);
                return Err(RelayError::AlreadyOpen {
                    path: path.to_string(),
                });
            }
        }

        let settings = LineSettings::raw_8n1(baud_rate);
        let device = {
            let _runtime = self.reactor.enter();
            self.backend.open(path, &settings)
        }
        .map_err(|source| {
            tracing::error!("Opening of port {} failed: {}", path, source);
            RelayError::DeviceOpenError {
                path: path.to_string(),
                source,
            }
        })?;

        *self.shared.target.lock() = Some(DeviceTarget {
            path: path.to_string(),
            settings,
        });
        *self.shared.writer.lock() = Some(device.writer);
        *self.shared.parked_reader.lock() = Some(device.reader);
        self.shared.dormant.store(false, Ordering::SeqCst);
        self.shared
            .lifecycle
            .store(Lifecycle::Open as u8, Ordering::SeqCst);

        tracing::info!(
            "Connected to {} serial device '{}' @ {}.",
            self.shared.label,
            path,
            settings
        );
        Ok(())
    }

    pub fn open_with_callback(
        &mut self,
        path: &str,
        baud_rate: u32,
        callback: ByteCallback,
    ) -> Result<()> {
        self.open(path, baud_rate)?;
        self.start_reading(callback)
    }

    /// Registers the byte callback and schedules the first read on the reactor.
    pub fn start_reading(&mut self, callback: ByteCallback) -> Result<()> {
        if !self.is_open() {
            return Err(RelayError::ChannelError {
                channel: self.shared.label.clone(),
                message: "channel is not open".to_string(),
            });
        }
        let Some(reader) = self.shared.parked_reader.lock().take() else {
            return Err(RelayError::ChannelError {
                channel: self.shared.label.clone(),
                message: "reads already started".to_string(),
            });
        };

        let (finished_tx, finished_rx) = mpsc::channel();
        let task = self.reactor.spawn(read_loop(
            Arc::clone(&self.shared),
            Arc::clone(&self.backend),
            reader,
            callback,
            finished_tx,
        ));
        self.read_task = Some(ReadTask {
            task,
            finished: finished_rx,
        });
        Ok(())
    }

    pub fn writer(&self) -> ChannelWriter {
        ChannelWriter {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn write(&self, data: &[u8]) -> Result<usize> {
        self.shared.write(data)
    }

    pub fn write_str(&self, text: &str) -> Result<usize> {
        self.shared.write(text.as_bytes())
    }

    /// Idempotent. Marks the channel closing, cancels the read task and releases the device.
    ///
    /// Off the reactor thread this waits for the read task to be dropped, so no callback starts
    /// after it returns.
    pub fn close(&mut self) {
        if self
            .shared
            .lifecycle
            .compare_exchange(
                Lifecycle::Open as u8,
                Lifecycle::Closing as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return;
        }

        if let Some(read_task) = self.read_task.take() {
            read_task.task.abort();
            if !self.reactor.is_reactor_thread() {
                let _ = read_task.finished.recv();
            }
        }

        self.shared.parked_reader.lock().take();
        self.shared.writer.lock().take();
        self.shared
            .lifecycle
            .store(Lifecycle::Closed as u8, Ordering::SeqCst);
        tracing::debug!("Closed {} serial device '{}'", self.shared.label, self.shared.path());
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.lifecycle()
    }

    pub fn is_open(&self) -> bool {
        self.shared.is_open()
    }

    /// True once a read error was followed by a failed reopen. The channel stays silent afterwards.
    pub fn is_dormant(&self) -> bool {
        self.shared.dormant.load(Ordering::SeqCst)
    }

    pub fn label(&self) -> &str {
        &self.shared.label
    }
}

impl Drop for SerialChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn read_loop(
    shared: Arc<ChannelShared>,
    backend: Arc<dyn SerialBackend>,
    mut reader: DeviceReader,
    mut callback: ByteCallback,
    _finished: mpsc::Sender<()>,
) {
    let mut buf = [0u8; READ_SIZE];
    loop {
        let result = reader.read(&mut buf).await;
        if !shared.is_open() {
            return;
        }

        let error = match result {
            Ok(0) => io::Error::new(io::ErrorKind::UnexpectedEof, "device closed the stream"),
            Ok(n) => {
                tracing::trace!("Received {} bytes on {}", n, shared.label);
                callback(&buf[..n]);
                continue;
            }
            Err(e) => e,
        };

        let Some(target) = shared.target.lock().clone() else {
            return;
        };
        tracing::error!("Error receiving data on '{}'; {}", target.path, error);

        // Release both halves before reopening the same path.
        drop(std::mem::replace(&mut reader, Box::new(tokio::io::empty())));
        shared.writer.lock().take();

        match backend.open(&target.path, &target.settings) {
            Ok(device) => {
                if !shared.is_open() {
                    return;
                }
                *shared.writer.lock() = Some(device.writer);
                reader = device.reader;
                tracing::warn!("Reconnected to serial device '{}'", target.path);
            }
            Err(e) => {
                tracing::error!("Retry failed on device '{}'; {}", target.path, e);
                shared.dormant.store(true, Ordering::SeqCst);
                return;
            }
        }
    }
}
