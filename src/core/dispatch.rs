use crate::core::accounting::ByteCounters;
use crate::domain::model::{InputSource, ProducerInput};
use crate::domain::ports::{ByteCallback, CorrectionProducer};
use parking_lot::Mutex;
use std::sync::Arc;

/// The single producer instance behind the relay-wide lock.
///
/// Every delivery takes the lock, bumps the source's counter and calls the matching handler.
/// The producer's callbacks fire from inside the handler, so they also run under the lock.
pub struct ProducerDispatch<P> {
    producer: Arc<Mutex<P>>,
    counters: Arc<ByteCounters>,
}

impl<P> Clone for ProducerDispatch<P> {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<P: CorrectionProducer> ProducerDispatch<P> {
    pub fn new(producer: P, counters: Arc<ByteCounters>) -> Self {
        Self {
            producer: Arc::new(Mutex::new(producer)),
            counters,
        }
    }

    pub fn deliver(&self, source: InputSource, data: &[u8]) {
        let mut producer = self.producer.lock();
        self.counters.record_input(source, data.len());
        match source.producer_input() {
            ProducerInput::ReceiverData => producer.handle_receiver_data(data),
            ProducerInput::PrimaryCorrection => producer.handle_primary_correction(data),
            ProducerInput::SecondaryCorrection => producer.handle_secondary_correction(data),
        }
    }

    /// A callback that delivers every chunk it is given from `source`.
    pub fn callback_for(&self, source: InputSource) -> ByteCallback {
        let dispatch = self.clone();
        Box::new(move |data: &[u8]| dispatch.deliver(source, data))
    }

    /// Runs `f` with the producer locked, for registering callbacks and similar setup.
    pub fn with_producer<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        f(&mut self.producer.lock())
    }

    pub fn counters(&self) -> &Arc<ByteCounters> {
        &self.counters
    }
}
