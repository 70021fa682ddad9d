use crate::config::ProducerConfig;
use crate::domain::ports::{ByteCallback, CorrectionProducer, PositionCallback};
use crate::utils::error::Result;
use crate::utils::validation::validate_existing_file;
use std::path::PathBuf;

/// Producer used when no conversion engine is linked.
///
/// Primary feed corrections are already in the receiver's format and are forwarded untouched.
/// Receiver data and secondary corrections need conversion, so they are dropped. No position
/// samples are ever reported.
pub struct PassthroughProducer {
    geoid: Option<PathBuf>,
    output: Option<ByteCallback>,
    dropped_bytes: u64,
}

impl PassthroughProducer {
    pub fn new(config: &ProducerConfig) -> Self {
        tracing::debug!(
            "Passthrough producer: MSM{} station {} position message {}",
            config.msm_type,
            config.station_id,
            config.position_message
        );
        Self {
            geoid: None,
            output: None,
            dropped_bytes: 0,
        }
    }

    /// Checks that the geoid model exists. Its contents are only needed for conversion.
    pub fn load_geoid(&mut self, path: &str) -> Result<()> {
        validate_existing_file("producer.geoid_file", path)?;
        tracing::info!("Using geoid model {}", path);
        self.geoid = Some(PathBuf::from(path));
        Ok(())
    }

    pub fn geoid(&self) -> Option<&PathBuf> {
        self.geoid.as_ref()
    }

    pub fn dropped_bytes(&self) -> u64 {
        self.dropped_bytes
    }

    fn drop_input(&mut self, kind: &str, data: &[u8]) {
        self.dropped_bytes += data.len() as u64;
        tracing::trace!("Dropping {} {} bytes", data.len(), kind);
    }
}

impl CorrectionProducer for PassthroughProducer {
    fn handle_receiver_data(&mut self, data: &[u8]) {
        self.drop_input("receiver", data);
    }

    fn handle_primary_correction(&mut self, data: &[u8]) {
        if let Some(output) = self.output.as_mut() {
            output(data);
        }
    }

    fn handle_secondary_correction(&mut self, data: &[u8]) {
        self.drop_input("secondary correction", data);
    }

    fn set_correction_callback(&mut self, callback: ByteCallback) {
        self.output = Some(callback);
    }

    fn set_position_callback(&mut self, _callback: PositionCallback) {
        tracing::debug!("Passthrough producer reports no positions");
    }
}
