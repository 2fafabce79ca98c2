use std::time::{Duration, Instant};

/// Per-origin politeness state
///
/// Request slots are reserved rather than checked, so concurrent workers
/// targeting the same origin are spaced out by at least the interval.
#[derive(Debug, Clone, Default)]
pub struct DomainState {
    /// Number of requests reserved against this origin
    pub request_count: u32,

    /// Start time of the most recently reserved request slot
    pub last_request_time: Option<Instant>,

    /// Crawl-delay from robots.txt, if any
    pub crawl_delay: Option<Duration>,
}

impl DomainState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective spacing: the larger of the configured interval and crawl-delay
    pub fn interval(&self, min_interval: Duration) -> Duration {
        self.crawl_delay.map_or(min_interval, |d| d.max(min_interval))
    }

    /// Reserves the next request slot and returns how long to wait for it
    pub fn reserve(&mut self, min_interval: Duration, now: Instant) -> Duration {
        let slot = match self.last_request_time {
            Some(last) => (last + self.interval(min_interval)).max(now),
            None => now,
        };
        self.last_request_time = Some(slot);
        self.request_count += 1;
        slot.saturating_duration_since(now)
    }

    /// Pushes the next slot out after a 429 answer
    pub fn back_off(&mut self, pause: Duration, now: Instant) {
        let until = now + pause;
        if self.last_request_time.map_or(true, |last| last < until) {
            self.last_request_time = Some(until);
        }
    }
}
