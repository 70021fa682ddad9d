pub mod accounting;
pub mod bringup;
pub mod dispatch;
pub mod reactor;
pub mod relay;
pub mod serial;
pub mod shutdown;
pub mod throttle;

pub use crate::domain::model::{ByteStats, InputSource, Lla, PositionSample};
pub use crate::domain::ports::{CorrectionProducer, FeedClient, FeedConnector, SerialBackend};
pub use crate::utils::error::Result;
