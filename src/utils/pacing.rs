//! Minimum-gap rate limiting
//!
//! Used wherever a fast producer (30 fps detectors) drives slow feedback
//! such as vibration or speech.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_gap: Duration,
    last: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last: None,
        }
    }

    /// Take the slot if at least `min_gap` has passed since the last grant
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.min_gap {
                return false;
            }
        }
        self.last = Some(now);
        true
    }

}
