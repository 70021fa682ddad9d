use crate::domain::model::ReceiverType;
use crate::utils::error::{RelayError, Result};
use crate::utils::validation::{
    validate_hex_digits, validate_non_empty_string, validate_one_of, validate_path,
    validate_positive_number, validate_range, validate_required_string, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CLIENT_ID: &str = "correction-relay";

/// Full relay configuration, loadable from TOML or assembled from the command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub receiver: ReceiverConfig,
    pub lband: LBandConfig,
    pub primary_feed: FeedConfig,
    pub secondary_feed: FeedConfig,
    pub producer: ProducerConfig,
}

/// The receiver's primary serial line. Receiver data is read from it and corrections are
/// written back to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    pub path: String,
    pub baud_rate: u32,
    /// Receiver-side name of the port, used in bring-up commands.
    pub interface: String,
    /// Send the bring-up command sequence at startup.
    pub configure: bool,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            path: "/dev/ttyACM0".to_string(),
            baud_rate: 460_800,
            interface: "USB1".to_string(),
            configure: true,
        }
    }
}

/// Raw L-band correction input on a second serial line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LBandConfig {
    pub enabled: bool,
    pub path: String,
    pub baud_rate: u32,
    pub interface: String,
    pub frequency_hz: u64,
    pub data_rate: u32,
    pub service: String,
    pub scramble: String,
    /// Every byte read from the L-band line is also appended here when set.
    pub log_path: Option<String>,
}

impl Default for LBandConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "/dev/ttyACM1".to_string(),
            baud_rate: 460_800,
            interface: "USB2".to_string(),
            frequency_hz: 1_555_492_500,
            data_rate: 4800,
            service: "5555".to_string(),
            scramble: "6969".to_string(),
            log_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub auth_endpoint: Option<String>,
    pub api_key: Option<String>,
    pub client_id: String,
    pub beacon: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            auth_endpoint: None,
            api_key: None,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            beacon: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub msm_type: u8,
    pub station_id: u16,
    pub position_message: u16,
    pub receiver_type: ReceiverType,
    pub geoid_file: Option<String>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            msm_type: 4,
            station_id: 0,
            position_message: 1005,
            receiver_type: ReceiverType::default(),
            geoid_file: None,
        }
    }
}

/// Built-in locations of one correction feed, used when its section names none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedDefaults {
    pub endpoint: &'static str,
    pub auth_endpoint: &'static str,
}

pub const PRIMARY_FEED_DEFAULTS: FeedDefaults = FeedDefaults {
    endpoint: "polaris.pointonenav.com",
    auth_endpoint: "api.pointonenav.com",
};

pub const SECONDARY_FEED_DEFAULTS: FeedDefaults = FeedDefaults {
    endpoint: "ssrz.polaris.p1beta.com",
    auth_endpoint: "api.p1beta.com",
};

impl FeedConfig {
    pub fn endpoint_or<'a>(&'a self, defaults: &FeedDefaults) -> &'a str {
        self.endpoint.as_deref().unwrap_or(defaults.endpoint)
    }

    pub fn auth_endpoint_or<'a>(&'a self, defaults: &FeedDefaults) -> &'a str {
        self.auth_endpoint.as_deref().unwrap_or(defaults.auth_endpoint)
    }
}

pub const LBAND_DATA_RATES: [u32; 4] = [600, 1200, 2400, 4800];
pub const POSITION_MESSAGES: [u16; 2] = [1005, 1006];
const LBAND_MIN_FREQUENCY_HZ: u64 = 152_500_000;
const LBAND_MAX_FREQUENCY_HZ: u64 = 1_559_000_000;

impl RelayConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// Replaces `${VAR}` with the environment value. Unset variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| RelayError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "Receiver: {} @ {} baud (interface {}, bring-up {})",
                self.receiver.path,
                self.receiver.baud_rate,
                self.receiver.interface,
                if self.receiver.configure { "on" } else { "off" }
            ),
            format!(
                "Producer: MSM{} station {} position message {} ({:?})",
                self.producer.msm_type,
                self.producer.station_id,
                self.producer.position_message,
                self.producer.receiver_type
            ),
            format!(
                "Geoid file: {}",
                self.producer.geoid_file.as_deref().unwrap_or("<not set>")
            ),
        ];

        if self.lband.enabled {
            lines.push(format!(
                "L-band: {} @ {} baud (interface {}, {} Hz, {} bps, service {}, scramble {})",
                self.lband.path,
                self.lband.baud_rate,
                self.lband.interface,
                self.lband.frequency_hz,
                self.lband.data_rate,
                self.lband.service,
                self.lband.scramble
            ));
            if let Some(log_path) = &self.lband.log_path {
                lines.push(format!("L-band byte log: {}", log_path));
            }
        } else {
            lines.push("L-band: disabled".to_string());
        }

        for (name, feed, defaults) in [
            ("Primary feed", &self.primary_feed, PRIMARY_FEED_DEFAULTS),
            ("Secondary feed", &self.secondary_feed, SECONDARY_FEED_DEFAULTS),
        ] {
            if !feed.enabled {
                lines.push(format!("{}: disabled", name));
                continue;
            }
            let mut line = format!(
                "{}: {} as '{}' (key {})",
                name,
                feed.endpoint_or(&defaults),
                feed.client_id,
                mask_secret(feed.api_key.as_deref())
            );
            if let Some(beacon) = &feed.beacon {
                line.push_str(&format!(", beacon {}", beacon));
            }
            lines.push(line);
        }

        lines
    }
}

/// Keeps the last four characters of a credential for identification.
pub fn mask_secret(secret: Option<&str>) -> String {
    match secret {
        None => "<not set>".to_string(),
        Some(s) if s.chars().count() <= 4 => "****".to_string(),
        Some(s) => {
            let tail: String = s.chars().skip(s.chars().count() - 4).collect();
            format!("****{}", tail)
        }
    }
}

impl Validate for RelayConfig {
    fn validate(&self) -> Result<()> {
        validate_path("receiver.path", &self.receiver.path)?;
        validate_positive_number("receiver.baud_rate", self.receiver.baud_rate, 1)?;
        validate_non_empty_string("receiver.interface", &self.receiver.interface)?;

        if self.lband.enabled {
            validate_path("lband.path", &self.lband.path)?;
            validate_positive_number("lband.baud_rate", self.lband.baud_rate, 1)?;
            validate_non_empty_string("lband.interface", &self.lband.interface)?;
            validate_range(
                "lband.frequency_hz",
                self.lband.frequency_hz,
                LBAND_MIN_FREQUENCY_HZ,
                LBAND_MAX_FREQUENCY_HZ,
            )?;
            validate_one_of("lband.data_rate", self.lband.data_rate, &LBAND_DATA_RATES)?;
            validate_hex_digits("lband.service", &self.lband.service, 4)?;
            validate_hex_digits("lband.scramble", &self.lband.scramble, 4)?;
            if let Some(log_path) = &self.lband.log_path {
                validate_path("lband.log_path", log_path)?;
            }
        }

        if self.primary_feed.enabled {
            validate_required_string("primary_feed.api_key", &self.primary_feed.api_key)?;
            validate_non_empty_string("primary_feed.client_id", &self.primary_feed.client_id)?;
        }
        if self.secondary_feed.enabled {
            validate_required_string("secondary_feed.api_key", &self.secondary_feed.api_key)?;
            validate_non_empty_string("secondary_feed.client_id", &self.secondary_feed.client_id)?;
            validate_required_string("secondary_feed.beacon", &self.secondary_feed.beacon)?;
        }

        validate_range("producer.msm_type", self.producer.msm_type, 1, 7)?;
        validate_one_of(
            "producer.position_message",
            self.producer.position_message,
            &POSITION_MESSAGES,
        )?;
        validate_required_string("producer.geoid_file", &self.producer.geoid_file)?;

        Ok(())
    }
}
