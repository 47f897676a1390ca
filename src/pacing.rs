use rand::Rng;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use tracing::trace;

/// An inclusive millisecond range to sleep for, with per-call jitter.
///
/// Delays around scrolling and extraction are a requirement of the element
/// source, not an optimization; every range is configurable and a zero range
/// disables the sleep (used by tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn zero() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }

    pub fn is_valid(&self) -> bool {
        self.min_ms <= self.max_ms
    }

    /// Pick a jittered duration from the range.
    pub fn sample(&self) -> Duration {
        if self.max_ms == 0 {
            return Duration::ZERO;
        }
        let ms = if self.min_ms == self.max_ms {
            self.min_ms
        } else {
            rand::thread_rng().gen_range(self.min_ms..=self.max_ms)
        };
        Duration::from_millis(ms)
    }

    /// Block the current thread for a jittered duration.
    pub fn sleep(&self) {
        let duration = self.sample();
        if !duration.is_zero() {
            trace!(?duration, "pacing sleep");
            thread::sleep(duration);
        }
    }
}

/// Where the collection loop pauses, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayProfile {
    /// Before each element extraction.
    pub pre_extract: DelayRange,
    /// Before requesting more elements.
    pub pre_advance: DelayRange,
    /// After requesting more elements, while the source settles.
    pub post_advance: DelayRange,
}

impl Default for DelayProfile {
    fn default() -> Self {
        Self {
            pre_extract: DelayRange::new(300, 1_000),
            pre_advance: DelayRange::new(1_000, 2_000),
            post_advance: DelayRange::new(2_000, 4_000),
        }
    }
}

impl DelayProfile {
    /// All delays disabled.
    pub const fn none() -> Self {
        Self {
            pre_extract: DelayRange::zero(),
            pre_advance: DelayRange::zero(),
            post_advance: DelayRange::zero(),
        }
    }
}
