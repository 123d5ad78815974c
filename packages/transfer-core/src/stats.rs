//! Read-only progress snapshots. Never mutated by callers — the send
//! and receive pipelines record samples as sub-chunks are acked or
//! verified, and hand out copies via their `stats()` accessor.

use std::collections::VecDeque;

/// Rolling-window throughput estimate, sampled on every acked
/// sub-chunk.
#[derive(Debug, Clone)]
pub struct SpeedTracker {
    samples: VecDeque<(u64, i64)>, // (bytes, timestamp_millis)
    window_millis: i64,
}

impl SpeedTracker {
    pub fn new(window_millis: i64) -> Self {
        Self {
            samples: VecDeque::new(),
            window_millis,
        }
    }

    pub fn record(&mut self, bytes: u64, now_millis: i64) {
        self.samples.push_back((bytes, now_millis));
        while let Some(&(_, ts)) = self.samples.front() {
            if now_millis - ts > self.window_millis {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Bytes per second over the current window, or 0 if fewer than
    /// two samples have landed.
    pub fn speed_bps(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }
        let total_bytes: u64 = self.samples.iter().map(|(b, _)| b).sum();
        let elapsed_millis = self.samples.back().unwrap().1 - self.samples.front().unwrap().1;
        if elapsed_millis <= 0 {
            return 0.0;
        }
        total_bytes as f64 / (elapsed_millis as f64 / 1000.0)
    }
}

impl Default for SpeedTracker {
    fn default() -> Self {
        Self::new(5_000)
    }
}

/// A point-in-time view of transfer progress.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferStats {
    pub bytes_total: u64,
    pub bytes_completed: u64,
    pub sub_chunks_total: u32,
    pub sub_chunks_acked: u32,
    pub sub_chunks_failed: u32,
    pub speed_bps: f64,
}

impl TransferStats {
    pub fn progress_percent(&self) -> f64 {
        if self.bytes_total == 0 {
            return 100.0;
        }
        (self.bytes_completed as f64 / self.bytes_total as f64) * 100.0
    }
}
