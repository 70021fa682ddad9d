use serde::{Deserialize, Serialize};
use std::fmt;

/// Geodetic position in degrees / degrees / meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lla {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
}

impl Lla {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_m: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            altitude_m,
        }
    }
}

impl fmt::Display for Lla {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.latitude_deg, self.longitude_deg, self.altitude_m
        )
    }
}

/// A position fix reported by the producer. Week 0 or a NaN time-of-week marks an invalid fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub week: u32,
    pub time_of_week_s: f64,
    pub position: Lla,
}

impl PositionSample {
    pub fn new(week: u32, time_of_week_s: f64, position: Lla) -> Self {
        Self {
            week,
            time_of_week_s,
            position,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.week != 0 && !self.time_of_week_s.is_nan()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Eight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
}

/// Serial line settings. Framing is always 8N1 without flow control; only the baud rate varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    baud_rate: u32,
    data_bits: DataBits,
    stop_bits: StopBits,
    parity: Parity,
    flow_control: FlowControl,
}

impl LineSettings {
    pub fn raw_8n1(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
        }
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn data_bits(&self) -> DataBits {
        self.data_bits
    }

    pub fn stop_bits(&self) -> StopBits {
        self.stop_bits
    }

    pub fn parity(&self) -> Parity {
        self.parity
    }

    pub fn flow_control(&self) -> FlowControl {
        self.flow_control
    }
}

impl fmt::Display for LineSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} baud 8N1", self.baud_rate)
    }
}

/// Where a chunk of incoming bytes came from. Each source feeds one producer handler and one counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    Receiver,
    SecondarySerial,
    PrimaryFeed,
    SecondaryFeed,
}

/// The producer operation an [`InputSource`] is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerInput {
    ReceiverData,
    PrimaryCorrection,
    SecondaryCorrection,
}

impl InputSource {
    pub fn producer_input(self) -> ProducerInput {
        match self {
            InputSource::Receiver => ProducerInput::ReceiverData,
            InputSource::PrimaryFeed => ProducerInput::PrimaryCorrection,
            InputSource::SecondarySerial | InputSource::SecondaryFeed => {
                ProducerInput::SecondaryCorrection
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            InputSource::Receiver => "receiver",
            InputSource::SecondarySerial => "l-band",
            InputSource::PrimaryFeed => "primary feed",
            InputSource::SecondaryFeed => "secondary feed",
        }
    }
}

/// Snapshot of the byte counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteStats {
    pub receiver_in: u64,
    pub secondary_in: u64,
    pub primary_feed_in: u64,
    pub secondary_feed_in: u64,
    pub output: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReceiverType {
    #[default]
    #[serde(rename = "septentrio-sbf")]
    SeptentrioSbf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_settings_framing_is_fixed_for_every_baud() {
        for baud in [9600, 19_200, 38_400, 57_600, 115_200, 230_400, 460_800, 921_600] {
            let settings = LineSettings::raw_8n1(baud);
            assert_eq!(settings.baud_rate(), baud);
            assert_eq!(settings.data_bits(), DataBits::Eight);
            assert_eq!(settings.stop_bits(), StopBits::One);
            assert_eq!(settings.parity(), Parity::None);
            assert_eq!(settings.flow_control(), FlowControl::None);
        }
    }

    #[test]
    fn test_sources_route_to_producer_inputs() {
        assert_eq!(
            InputSource::Receiver.producer_input(),
            ProducerInput::ReceiverData
        );
        assert_eq!(
            InputSource::PrimaryFeed.producer_input(),
            ProducerInput::PrimaryCorrection
        );
        assert_eq!(
            InputSource::SecondarySerial.producer_input(),
            ProducerInput::SecondaryCorrection
        );
        assert_eq!(
            InputSource::SecondaryFeed.producer_input(),
            ProducerInput::SecondaryCorrection
        );
    }

    #[test]
    fn test_position_sample_validity() {
        let here = Lla::new(37.0, -122.0, 10.0);
        assert!(PositionSample::new(2300, 1.0, here).is_valid());
        assert!(!PositionSample::new(0, 1.0, here).is_valid());
        assert!(!PositionSample::new(2300, f64::NAN, here).is_valid());
    }
}
