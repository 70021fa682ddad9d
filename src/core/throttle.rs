use crate::domain::model::{Lla, PositionSample};
use crate::domain::ports::FeedClient;
use std::sync::Arc;

/// Minimum spacing between forwarded positions within one GNSS week.
pub const MIN_UPLOAD_INTERVAL_S: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptedPosition {
    pub position: Lla,
    /// Set only for the very first accepted sample.
    pub initial: bool,
}

/// Rate limiter for producer position samples.
#[derive(Debug, Default)]
pub struct PositionThrottle {
    last_week: u32,
    last_time_of_week_s: f64,
    has_accepted: bool,
}

impl PositionThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer(&mut self, sample: &PositionSample) -> Option<AcceptedPosition> {
        if !sample.is_valid() {
            return None;
        }
        // A week change always passes; no rollover arithmetic.
        if sample.week == self.last_week
            && sample.time_of_week_s < self.last_time_of_week_s + MIN_UPLOAD_INTERVAL_S
        {
            return None;
        }

        let initial = !self.has_accepted;
        self.has_accepted = true;
        self.last_week = sample.week;
        self.last_time_of_week_s = sample.time_of_week_s;

        Some(AcceptedPosition {
            position: sample.position,
            initial,
        })
    }
}

/// Throttled position feedback bound to the feed client that accepts uploads.
pub struct PositionForwarder {
    throttle: PositionThrottle,
    uplink: Option<Arc<dyn FeedClient>>,
}

impl PositionForwarder {
    pub fn new(uplink: Option<Arc<dyn FeedClient>>) -> Self {
        Self {
            throttle: PositionThrottle::new(),
            uplink,
        }
    }

    pub fn on_sample(&mut self, sample: &PositionSample) {
        let Some(accepted) = self.throttle.offer(sample) else {
            return;
        };
        if accepted.initial {
            tracing::info!("Initial position set at {}.", accepted.position);
        }
        if let Some(uplink) = &self.uplink {
            uplink.upload_position(&accepted.position);
        }
    }
}
