pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::RelayConfig;
pub use core::{relay::StreamRelay, shutdown::ShutdownSignal};
pub use utils::error::{RelayError, Result};
