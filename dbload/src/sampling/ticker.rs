use std::fmt;
use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

/// Fixed-schedule ticker for the sampling loop.
///
/// Ticks land on `start + n * period`. A tick that is missed because a read ran long is
/// skipped rather than bursted, so read latency never accumulates into drift.
pub(crate) struct Ticker {
    interval: Interval,
    period: Duration,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval, period }
    }

    /// Wait for the next tick and return its scheduled instant. The first tick completes
    /// immediately.
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", humantime::format_duration(self.period))
    }
}
