use crate::domain::model::{ByteStats, InputSource};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-lifetime byte counters.
///
/// Each counter is bumped inside the critical section of the transfer it counts, so atomics
/// only serve to let the producer's own output callback update them without re-locking.
#[derive(Debug, Default)]
pub struct ByteCounters {
    receiver_in: AtomicU64,
    secondary_in: AtomicU64,
    primary_feed_in: AtomicU64,
    secondary_feed_in: AtomicU64,
    output: AtomicU64,
}

impl ByteCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_input(&self, source: InputSource, bytes: usize) {
        let counter = match source {
            InputSource::Receiver => &self.receiver_in,
            InputSource::SecondarySerial => &self.secondary_in,
            InputSource::PrimaryFeed => &self.primary_feed_in,
            InputSource::SecondaryFeed => &self.secondary_feed_in,
        };
        counter.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_output(&self, bytes: usize) {
        self.output.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ByteStats {
        ByteStats {
            receiver_in: self.receiver_in.load(Ordering::Relaxed),
            secondary_in: self.secondary_in.load(Ordering::Relaxed),
            primary_feed_in: self.primary_feed_in.load(Ordering::Relaxed),
            secondary_feed_in: self.secondary_feed_in.load(Ordering::Relaxed),
            output: self.output.load(Ordering::Relaxed),
        }
    }
}

impl ByteStats {
    pub fn log_report(&self) {
        tracing::info!("IO Stats:");
        tracing::info!("{:>12}  Receiver bytes read from receiver", self.receiver_in);
        tracing::info!("{:>12}  L-band correction bytes read from receiver", self.secondary_in);
        tracing::info!("{:>12}  Correction bytes read from primary feed", self.primary_feed_in);
        tracing::info!("{:>12}  Correction bytes read from secondary feed", self.secondary_feed_in);
        tracing::info!("{:>12}  Correction bytes written to receiver", self.output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_inputs_land_in_their_own_counters() {
        let counters = ByteCounters::new();
        counters.record_input(InputSource::Receiver, 10);
        counters.record_input(InputSource::SecondarySerial, 20);
        counters.record_input(InputSource::PrimaryFeed, 30);
        counters.record_input(InputSource::SecondaryFeed, 40);
        counters.record_output(50);
        counters.record_input(InputSource::Receiver, 1);

        assert_eq!(
            counters.snapshot(),
            ByteStats {
                receiver_in: 11,
                secondary_in: 20,
                primary_feed_in: 30,
                secondary_feed_in: 40,
                output: 50,
            }
        );
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let counters = Arc::new(ByteCounters::new());
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let counters = Arc::clone(&counters);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        counters.record_output(3);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(counters.snapshot().output, 12_000);
    }
}
