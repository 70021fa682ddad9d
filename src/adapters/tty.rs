use crate::domain::model::{self, LineSettings};
use crate::domain::ports::{SerialBackend, SerialDevice};
use std::io;
use std::time::Duration;
use tokio_serial::SerialPortBuilderExt;

/// Poll interval for a blocked write. The write loop retries on timeout, so this only bounds
/// how long a single attempt waits for the driver.
const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

fn data_bits(value: model::DataBits) -> tokio_serial::DataBits {
    match value {
        model::DataBits::Eight => tokio_serial::DataBits::Eight,
    }
}

fn stop_bits(value: model::StopBits) -> tokio_serial::StopBits {
    match value {
        model::StopBits::One => tokio_serial::StopBits::One,
    }
}

fn parity(value: model::Parity) -> tokio_serial::Parity {
    match value {
        model::Parity::None => tokio_serial::Parity::None,
    }
}

fn flow_control(value: model::FlowControl) -> tokio_serial::FlowControl {
    match value {
        model::FlowControl::None => tokio_serial::FlowControl::None,
    }
}

fn builder(path: &str, settings: &LineSettings) -> tokio_serial::SerialPortBuilder {
    tokio_serial::new(path, settings.baud_rate())
        .data_bits(data_bits(settings.data_bits()))
        .stop_bits(stop_bits(settings.stop_bits()))
        .parity(parity(settings.parity()))
        .flow_control(flow_control(settings.flow_control()))
        .timeout(WRITE_TIMEOUT)
}

/// Real serial devices through `tokio-serial`.
///
/// Each open yields two handles on the same tty: an async stream registered with the calling
/// runtime for reads, and a blocking port for writes. Both drop exclusive mode so the receiver
/// line can be held by the output and receiver channels at once.
#[derive(Debug, Default, Clone, Copy)]
pub struct TtyBackend;

impl TtyBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SerialBackend for TtyBackend {
    fn open(&self, path: &str, settings: &LineSettings) -> io::Result<SerialDevice> {
        #[allow(unused_mut)]
        let mut reader = builder(path, settings).open_native_async()?;
        #[cfg(unix)]
        reader.set_exclusive(false)?;

        #[allow(unused_mut)]
        let mut writer = builder(path, settings).open_native()?;
        #[cfg(unix)]
        writer.set_exclusive(false)?;

        tracing::debug!("Opened tty {} with {}", path, settings);
        Ok(SerialDevice {
            reader: Box::new(reader),
            writer: Box::new(writer),
        })
    }
}
