use crate::config::{LBandConfig, RelayConfig};
use crate::core::serial::ChannelWriter;
use crate::utils::error::Result;
use std::time::Duration;

pub const COMMAND_PACING: Duration = Duration::from_millis(100);

const COMMAND_MODE_REQUEST: &str = "SSSSSSSSSS";
const NAVIGATION_STREAMS: &str = "GPSNav+GLONav+GALNav+BDSNav+PVTGeodetic";

/// Receiver configuration sent over the output channel before any data flows.
#[derive(Debug, Clone, PartialEq)]
pub struct BringUpPlan {
    receiver_interface: String,
    lband: Option<LBandConfig>,
}

impl BringUpPlan {
    pub fn new(receiver_interface: impl Into<String>, lband: Option<LBandConfig>) -> Self {
        Self {
            receiver_interface: receiver_interface.into(),
            lband,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        let lband = config.lband.enabled.then(|| config.lband.clone());
        Self::new(config.receiver.interface.clone(), lband)
    }

    /// The command lines in send order, each terminated by a carriage return.
    pub fn commands(&self) -> Vec<String> {
        let mut commands = vec![format!("{}\r", COMMAND_MODE_REQUEST)];

        if let Some(lband) = &self.lband {
            commands.push(format!("setDataInOut, {}, , LBandBeam1\r", lband.interface));
            commands.push(format!(
                "setLBandBeams, User1, {}, baud{}, \"Unknown\", \"Unknown\", Enabled\r",
                lband.frequency_hz, lband.data_rate
            ));
            commands.push(format!(
                "setLBandCustomServiceID, \"{}\", \"{}\", off\r",
                lband.service, lband.scramble
            ));
            commands.push("setLBandSelectMode, manual, , ,\r".to_string());
        }

        commands.push(format!(
            "setSBFOutput, Stream2, {}, {}, sec1\r",
            self.receiver_interface, NAVIGATION_STREAMS
        ));
        commands.push(format!("setDataInOut, {}, , SBF\r", self.receiver_interface));
        commands
    }

    pub fn run(&self, port: &ChannelWriter, pacing: Duration) -> Result<()> {
        for (index, command) in self.commands().iter().enumerate() {
            if index > 0 && !pacing.is_zero() {
                std::thread::sleep(pacing);
            }
            tracing::debug!("Sending receiver command: {:?}", command);
            port.write_str(command)?;
        }
        Ok(())
    }
}
