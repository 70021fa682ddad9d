use crate::config::toml_config::{
    FeedConfig, FeedDefaults, RelayConfig, PRIMARY_FEED_DEFAULTS, SECONDARY_FEED_DEFAULTS,
};
use crate::core::accounting::ByteCounters;
use crate::core::bringup::{BringUpPlan, COMMAND_PACING};
use crate::core::dispatch::ProducerDispatch;
use crate::core::reactor::Reactor;
use crate::core::serial::SerialChannel;
use crate::core::throttle::PositionForwarder;
use crate::domain::model::{ByteStats, InputSource, PositionSample};
use crate::domain::ports::{
    ByteCallback, CorrectionProducer, FeedClient, FeedConnector, FeedSettings, SerialBackend,
};
use crate::utils::error::{RelayError, Result};
use crate::utils::validation::validate_required_string;
use parking_lot::Mutex;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// How one configured feed is validated, routed and located.
struct FeedRole {
    section: &'static str,
    source: InputSource,
    requires_beacon: bool,
    defaults: FeedDefaults,
}

const PRIMARY_FEED: FeedRole = FeedRole {
    section: "primary_feed",
    source: InputSource::PrimaryFeed,
    requires_beacon: false,
    defaults: PRIMARY_FEED_DEFAULTS,
};

const SECONDARY_FEED: FeedRole = FeedRole {
    section: "secondary_feed",
    source: InputSource::SecondaryFeed,
    requires_beacon: true,
    defaults: SECONDARY_FEED_DEFAULTS,
};

/// Append-only copy of the raw L-band stream.
#[derive(Clone)]
struct RawByteLog {
    path: String,
    file: Arc<Mutex<Option<File>>>,
}

impl RawByteLog {
    fn create(path: &str) -> Result<Self> {
        let file = File::create(path).map_err(|source| RelayError::LogFileError {
            path: path.to_string(),
            source,
        })?;
        tracing::info!("Logging raw L-band bytes to {}", path);
        Ok(Self {
            path: path.to_string(),
            file: Arc::new(Mutex::new(Some(file))),
        })
    }

    fn append(&self, data: &[u8]) {
        if let Some(file) = self.file.lock().as_mut() {
            if let Err(e) = file.write_all(data) {
                tracing::error!("Failed to append to byte log {}: {}", self.path, e);
            }
        }
    }

    fn close(&self) {
        if let Some(mut file) = self.file.lock().take() {
            if let Err(e) = file.flush() {
                tracing::warn!("Failed to flush byte log {}: {}", self.path, e);
            }
        }
    }
}

/// A started feed client. Stopping blocks until the feed's thread has exited.
struct FeedHandle {
    name: &'static str,
    client: Arc<dyn FeedClient>,
}

impl FeedHandle {
    fn stop(&self) {
        self.client.stop();
        tracing::debug!("Stopped {}", self.name);
    }
}

/// Which optional collaborators were started, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveSources {
    pub lband: bool,
    pub primary_feed: bool,
    pub secondary_feed: bool,
}

/// Owns every channel and feed, routes their bytes into the shared producer and writes the
/// producer's output back to the receiver.
///
/// Dropping a relay runs the same ordered teardown as [`StreamRelay::shutdown`].
pub struct StreamRelay<P: CorrectionProducer> {
    dispatch: ProducerDispatch<P>,
    reactor: Reactor,
    output: SerialChannel,
    receiver: SerialChannel,
    lband: SerialChannel,
    byte_log: Option<RawByteLog>,
    primary_feed: Option<FeedHandle>,
    secondary_feed: Option<FeedHandle>,
    bringup_pacing: Duration,
    final_stats: Option<ByteStats>,
}

impl<P: CorrectionProducer> StreamRelay<P> {
    pub fn start(
        config: &RelayConfig,
        producer: P,
        backend: Arc<dyn SerialBackend>,
        feeds: Arc<dyn FeedConnector>,
    ) -> Result<Self> {
        Self::start_with_pacing(config, producer, backend, feeds, COMMAND_PACING)
    }

    /// Like [`StreamRelay::start`], with a custom delay between bring-up commands.
    pub fn start_with_pacing(
        config: &RelayConfig,
        producer: P,
        backend: Arc<dyn SerialBackend>,
        feeds: Arc<dyn FeedConnector>,
        bringup_pacing: Duration,
    ) -> Result<Self> {
        let reactor = Reactor::start()?;
        let handle = reactor.handle();
        let mut relay = Self {
            dispatch: ProducerDispatch::new(producer, Arc::new(ByteCounters::new())),
            output: SerialChannel::new("output", handle.clone(), Arc::clone(&backend)),
            receiver: SerialChannel::new("receiver", handle.clone(), Arc::clone(&backend)),
            lband: SerialChannel::new("l-band", handle, backend),
            reactor,
            byte_log: None,
            primary_feed: None,
            secondary_feed: None,
            bringup_pacing,
            final_stats: None,
        };

        // On error `relay` is dropped here, which tears down whatever was started.
        relay.bring_up(config, feeds.as_ref())?;
        Ok(relay)
    }

    fn bring_up(&mut self, config: &RelayConfig, feeds: &dyn FeedConnector) -> Result<()> {
        self.open_output(config)?;

        if config.receiver.configure {
            tracing::info!("Configuring receiver on {}", config.receiver.path);
            BringUpPlan::from_config(config).run(&self.output.writer(), self.bringup_pacing)?;
        }

        if config.primary_feed.enabled {
            let client = self.start_feed(feeds, &config.primary_feed, &PRIMARY_FEED)?;
            self.primary_feed = Some(FeedHandle {
                name: "primary feed",
                client,
            });
        }

        if config.secondary_feed.enabled {
            let client = self.start_feed(feeds, &config.secondary_feed, &SECONDARY_FEED)?;
            self.secondary_feed = Some(FeedHandle {
                name: "secondary feed",
                client,
            });
        }

        let uplink = self.primary_feed.as_ref().map(|feed| Arc::clone(&feed.client));
        let mut forwarder = PositionForwarder::new(uplink);
        self.dispatch.with_producer(|producer| {
            producer.set_position_callback(Box::new(move |sample: &PositionSample| {
                forwarder.on_sample(sample)
            }))
        });

        if config.lband.enabled {
            let lband = &config.lband;
            let mut deliver = self.dispatch.callback_for(InputSource::SecondarySerial);
            let callback: ByteCallback = match &lband.log_path {
                Some(path) => {
                    let log = RawByteLog::create(path)?;
                    self.byte_log = Some(log.clone());
                    Box::new(move |data: &[u8]| {
                        log.append(data);
                        deliver(data);
                    })
                }
                None => deliver,
            };
            self.lband
                .open_with_callback(&lband.path, lband.baud_rate, callback)?;
        }

        let receiver_callback = self.dispatch.callback_for(InputSource::Receiver);
        self.receiver.open_with_callback(
            &config.receiver.path,
            config.receiver.baud_rate,
            receiver_callback,
        )?;

        tracing::info!("Correction relay running");
        Ok(())
    }

    fn open_output(&mut self, config: &RelayConfig) -> Result<()> {
        self.output
            .open(&config.receiver.path, config.receiver.baud_rate)?;

        let writer = self.output.writer();
        let counters = Arc::clone(self.dispatch.counters());
        self.dispatch.with_producer(|producer| {
            producer.set_correction_callback(Box::new(move |data: &[u8]| {
                match writer.write(data) {
                    Ok(written) => counters.record_output(written),
                    Err(e) => tracing::error!("Failed to write corrections: {}", e),
                }
            }))
        });
        Ok(())
    }

    fn start_feed(
        &self,
        feeds: &dyn FeedConnector,
        config: &FeedConfig,
        role: &FeedRole,
    ) -> Result<Arc<dyn FeedClient>> {
        let section = role.section;
        let api_key = validate_required_string(&format!("{}.api_key", section), &config.api_key)?;
        let mut settings = FeedSettings::new(api_key, config.client_id.clone())
            .with_endpoint(config.endpoint_or(&role.defaults))
            .with_auth_endpoint(config.auth_endpoint_or(&role.defaults));
        if role.requires_beacon {
            let beacon = validate_required_string(&format!("{}.beacon", section), &config.beacon)?;
            settings = settings.with_beacon(beacon);
        }

        let mut client = feeds.connect(settings)?;
        client.set_correction_callback(self.dispatch.callback_for(role.source));
        client.run_async()?;
        tracing::info!("Started {}", role.source.label());
        Ok(Arc::from(client))
    }

    pub fn active_sources(&self) -> ActiveSources {
        ActiveSources {
            lband: self.lband.is_open(),
            primary_feed: self.primary_feed.is_some(),
            secondary_feed: self.secondary_feed.is_some(),
        }
    }

    /// Counters as of now. Values keep growing until shutdown.
    pub fn stats(&self) -> ByteStats {
        self.dispatch.counters().snapshot()
    }

    /// Runs `f` with the producer locked, serialized with every delivery.
    pub fn with_producer<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        self.dispatch.with_producer(f)
    }

    /// Stops everything in order and returns the final byte counters.
    pub fn shutdown(mut self) -> ByteStats {
        self.teardown()
    }

    fn teardown(&mut self) -> ByteStats {
        if let Some(stats) = self.final_stats {
            return stats;
        }

        tracing::info!("Shutting down correction relay");
        self.receiver.close();
        self.lband.close();
        if let Some(log) = self.byte_log.take() {
            log.close();
        }

        if let Some(feed) = self.secondary_feed.take() {
            feed.stop();
        }
        if let Some(feed) = self.primary_feed.take() {
            feed.stop();
        }

        self.output.close();
        self.reactor.stop();

        let stats = self.dispatch.counters().snapshot();
        stats.log_report();
        self.final_stats = Some(stats);
        stats
    }
}

impl<P: CorrectionProducer> Drop for StreamRelay<P> {
    fn drop(&mut self) {
        self.teardown();
    }
}
