#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use toml_config::{
    FeedConfig, FeedDefaults, LBandConfig, ProducerConfig, ReceiverConfig, RelayConfig,
    PRIMARY_FEED_DEFAULTS, SECONDARY_FEED_DEFAULTS,
};
