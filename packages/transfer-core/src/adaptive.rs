//! Optional adaptive pacing for the send pipeline (spec.md §4.4,
//! "OPTIONAL"). Off by default; when enabled via
//! [`crate::config::SendConfig::adaptive`], the sender inserts a small,
//! bounded extra delay before each send that grows with recent retry
//! pressure and decays back to zero once sub-chunks start acking
//! cleanly again. This never overrides the backpressure/admission
//! gates — it only adds pacing on top of them.

use std::time::Duration;

const STEP_MILLIS: u64 = 20;
const MAX_STEPS: u32 = 5;

/// Tracks recent retry pressure and derives an inter-send delay from
/// it.
#[derive(Debug, Default)]
pub struct AdaptiveTuner {
    consecutive_retries: u32,
}

impl AdaptiveTuner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sub-chunk needed a retry: ramp the delay up.
    pub fn on_retry(&mut self) {
        self.consecutive_retries = (self.consecutive_retries + 1).min(MAX_STEPS);
    }

    /// A sub-chunk acked cleanly: decay the delay back toward zero
    /// rather than resetting instantly, so a single good ack after a
    /// rough patch doesn't immediately re-saturate the channel.
    pub fn on_ack(&mut self) {
        self.consecutive_retries = self.consecutive_retries.saturating_sub(1);
    }

    /// The extra delay to wait before the next send, capped at
    /// `MAX_STEPS * STEP_MILLIS`.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.consecutive_retries as u64 * STEP_MILLIS)
    }
}
