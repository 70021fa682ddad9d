use crate::config::toml_config::{
    FeedConfig, LBandConfig, ProducerConfig, ReceiverConfig, RelayConfig, DEFAULT_CLIENT_ID,
};
use crate::domain::model::ReceiverType;
use crate::utils::error::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "correction-relay")]
#[command(about = "Relays GNSS correction streams between a receiver, network feeds and a correction engine")]
pub struct CliConfig {
    /// Load the whole configuration from a TOML file; the device and feed flags are ignored
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value = "/dev/ttyACM0")]
    pub receiver_path: String,

    #[arg(long, default_value = "460800")]
    pub receiver_baud: u32,

    #[arg(long, default_value = "USB1")]
    pub receiver_interface: String,

    #[arg(long, help = "Do not send the bring-up command sequence to the receiver")]
    pub no_configure: bool,

    #[arg(long, help = "Read raw L-band corrections from a second serial line")]
    pub lband: bool,

    #[arg(long, default_value = "/dev/ttyACM1")]
    pub lband_path: String,

    #[arg(long, default_value = "460800")]
    pub lband_baud: u32,

    #[arg(long, default_value = "USB2")]
    pub lband_interface: String,

    #[arg(long, default_value = "1555492500")]
    pub lband_frequency: u64,

    #[arg(long, default_value = "4800")]
    pub lband_data_rate: u32,

    #[arg(long, default_value = "5555")]
    pub lband_service: String,

    #[arg(long, default_value = "6969")]
    pub lband_scramble: String,

    #[arg(long, help = "Append every raw L-band byte to this file (truncated at startup)")]
    pub lband_log: Option<String>,

    #[arg(long, help = "Enable the primary correction feed")]
    pub primary_feed: bool,

    #[arg(long, env = "PRIMARY_FEED_API_KEY", hide_env_values = true)]
    pub primary_api_key: Option<String>,

    #[arg(long)]
    pub primary_endpoint: Option<String>,

    #[arg(long)]
    pub primary_auth_endpoint: Option<String>,

    #[arg(long, default_value = DEFAULT_CLIENT_ID)]
    pub primary_client_id: String,

    #[arg(long, help = "Enable the secondary correction feed")]
    pub secondary_feed: bool,

    #[arg(long, env = "SECONDARY_FEED_API_KEY", hide_env_values = true)]
    pub secondary_api_key: Option<String>,

    #[arg(long)]
    pub secondary_endpoint: Option<String>,

    #[arg(long)]
    pub secondary_auth_endpoint: Option<String>,

    #[arg(long, default_value = DEFAULT_CLIENT_ID)]
    pub secondary_client_id: String,

    #[arg(long)]
    pub secondary_beacon: Option<String>,

    #[arg(long, default_value = "4", help = "MSM message type (1-7)")]
    pub msm_type: u8,

    #[arg(long, default_value = "0")]
    pub station_id: u16,

    #[arg(long, default_value = "1005", help = "Station position message (1005 or 1006)")]
    pub position_message: u16,

    #[arg(long)]
    pub geoid_file: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,

    #[arg(long, help = "Log process CPU and memory usage")]
    pub monitor: bool,

    #[arg(long, help = "Print the configuration and bring-up commands, then exit")]
    pub dry_run: bool,
}

impl CliConfig {
    /// The effective relay configuration: the TOML file when `--config` is given, the flags otherwise.
    pub fn resolve(&self) -> Result<RelayConfig> {
        match &self.config {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                RelayConfig::from_file(path)
            }
            None => Ok(self.to_relay_config()),
        }
    }

    pub fn to_relay_config(&self) -> RelayConfig {
        RelayConfig {
            receiver: ReceiverConfig {
                path: self.receiver_path.clone(),
                baud_rate: self.receiver_baud,
                interface: self.receiver_interface.clone(),
                configure: !self.no_configure,
            },
            lband: LBandConfig {
                enabled: self.lband,
                path: self.lband_path.clone(),
                baud_rate: self.lband_baud,
                interface: self.lband_interface.clone(),
                frequency_hz: self.lband_frequency,
                data_rate: self.lband_data_rate,
                service: self.lband_service.clone(),
                scramble: self.lband_scramble.clone(),
                log_path: self.lband_log.clone(),
            },
            primary_feed: FeedConfig {
                enabled: self.primary_feed,
                endpoint: self.primary_endpoint.clone(),
                auth_endpoint: self.primary_auth_endpoint.clone(),
                api_key: self.primary_api_key.clone(),
                client_id: self.primary_client_id.clone(),
                beacon: None,
            },
            secondary_feed: FeedConfig {
                enabled: self.secondary_feed,
                endpoint: self.secondary_endpoint.clone(),
                auth_endpoint: self.secondary_auth_endpoint.clone(),
                api_key: self.secondary_api_key.clone(),
                client_id: self.secondary_client_id.clone(),
                beacon: self.secondary_beacon.clone(),
            },
            producer: ProducerConfig {
                msm_type: self.msm_type,
                station_id: self.station_id,
                position_message: self.position_message,
                receiver_type: ReceiverType::SeptentrioSbf,
                geoid_file: self.geoid_file.clone(),
            },
        }
    }
}
